//! Transaction serialization used for signature digests

use bitcoin_hashes::{sha256d, Hash as BitcoinHash, HashEngine};

use crate::types::*;

/// Encode a number as a Bitcoin varint (CompactSize)
pub fn encode_varint(value: u64) -> Vec<u8> {
    if value < 0xfd {
        vec![value as u8]
    } else if value <= 0xffff {
        let mut result = vec![0xfd];
        result.extend_from_slice(&(value as u16).to_le_bytes());
        result
    } else if value <= 0xffffffff {
        let mut result = vec![0xfe];
        result.extend_from_slice(&(value as u32).to_le_bytes());
        result
    } else {
        let mut result = vec![0xff];
        result.extend_from_slice(&value.to_le_bytes());
        result
    }
}

/// Append `data` prefixed with its varint length.
pub fn write_var_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&encode_varint(data.len() as u64));
    out.extend_from_slice(data);
}

pub fn serialize_outpoint(out: &mut Vec<u8>, prevout: &OutPoint) {
    out.extend_from_slice(&prevout.hash);
    out.extend_from_slice(&(prevout.index as u32).to_le_bytes());
}

pub fn serialize_output(out: &mut Vec<u8>, output: &TransactionOutput) {
    out.extend_from_slice(&output.value.to_le_bytes());
    write_var_bytes(out, &output.script_pubkey);
}

/// Serialize(tx) without witness data.
pub fn serialize_transaction(tx: &Transaction) -> ByteString {
    let mut out = Vec::new();
    out.extend_from_slice(&(tx.version as u32).to_le_bytes());

    out.extend_from_slice(&encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        serialize_outpoint(&mut out, &input.prevout);
        write_var_bytes(&mut out, &input.script_sig);
        out.extend_from_slice(&(input.sequence as u32).to_le_bytes());
    }

    out.extend_from_slice(&encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        serialize_output(&mut out, output);
    }

    out.extend_from_slice(&(tx.lock_time as u32).to_le_bytes());
    out
}

/// Double SHA-256 of `data`
pub fn double_sha256(data: &[u8]) -> Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(data);
    sha256d::Hash::from_engine(engine).into_inner()
}

/// Transaction id: double SHA-256 of the witness-stripped serialization
pub fn txid(tx: &Transaction) -> Hash {
    double_sha256(&serialize_transaction(tx))
}

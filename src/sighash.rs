//! Signature digest computation: legacy and BIP143

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;
use crate::error::{Result, SignError};
use crate::script::parse_script;
use crate::segwit::TxSigHashes;
use crate::transaction::{
    double_sha256, encode_varint, serialize_outpoint, serialize_output, serialize_transaction,
    write_var_bytes,
};
use crate::types::*;

/// Hash type of a signature, encoded in its last byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SigHashType(pub u32);

impl SigHashType {
    pub const OLD: SigHashType = SigHashType(0x0);
    pub const ALL: SigHashType = SigHashType(0x1);
    pub const NONE: SigHashType = SigHashType(0x2);
    pub const SINGLE: SigHashType = SigHashType(0x3);
    pub const ANYONE_CAN_PAY: SigHashType = SigHashType(0x80);

    const MASK: u32 = 0x1f;

    /// Hash type carried by the trailing byte of an encoded signature.
    pub fn from_sig_byte(byte: u8) -> Self {
        SigHashType(byte as u32)
    }

    /// The byte appended to a DER signature.
    ///
    /// Hash types above 0xff have no single-byte encoding and are rejected.
    pub fn to_sig_byte(self) -> Result<u8> {
        u8::try_from(self.0)
            .map_err(|_| SignError::Signing(format!("hash type 0x{:x} does not fit in a signature byte", self.0)))
    }

    pub fn base_type(self) -> u32 {
        self.0 & Self::MASK
    }

    pub fn anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONE_CAN_PAY.0 != 0
    }

    pub fn with_anyone_can_pay(self) -> Self {
        SigHashType(self.0 | Self::ANYONE_CAN_PAY.0)
    }
}

impl fmt::Display for SigHashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match self.base_type() {
            1 => "ALL",
            2 => "NONE",
            3 => "SINGLE",
            _ => return write!(f, "0x{:02x}", self.0),
        };
        if self.anyone_can_pay() {
            write!(f, "{}|ANYONECANPAY", base)
        } else {
            f.write_str(base)
        }
    }
}

/// Digest returned for SIGHASH_SINGLE when the input has no matching output.
#[rustfmt::skip]
const SIGHASH_SINGLE_BUG: Hash = [
    1, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 0, 0,
];

/// Legacy signature digest of input `input_index` over `script_code`.
///
/// 1. Blank every input script except `input_index`, which gets
///    `script_code` with OP_CODESEPARATOR removed
/// 2. Apply NONE / SINGLE / ANYONECANPAY masking
/// 3. Return SHA256d(Serialize(tx') || hash_type as u32 LE)
pub fn calc_signature_hash(
    script_code: &[u8],
    hash_type: SigHashType,
    tx: &Transaction,
    input_index: usize,
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(SignError::SigHash(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }

    if hash_type.base_type() == SigHashType::SINGLE.0 && input_index >= tx.outputs.len() {
        return Ok(SIGHASH_SINGLE_BUG);
    }

    let script_code = remove_codeseparators(script_code)?;

    let mut tx_copy = tx.clone();
    for (i, input) in tx_copy.inputs.iter_mut().enumerate() {
        input.witness.clear();
        input.script_sig = if i == input_index {
            script_code.clone()
        } else {
            Vec::new()
        };
    }

    match hash_type.base_type() {
        2 => {
            tx_copy.outputs.clear();
            zero_other_sequences(&mut tx_copy, input_index);
        }
        3 => {
            tx_copy.outputs.truncate(input_index + 1);
            for output in tx_copy.outputs.iter_mut().take(input_index) {
                output.value = -1;
                output.script_pubkey.clear();
            }
            zero_other_sequences(&mut tx_copy, input_index);
        }
        _ => {}
    }

    if hash_type.anyone_can_pay() {
        let input = tx_copy.inputs.swap_remove(input_index);
        tx_copy.inputs = vec![input];
    }

    let mut preimage = serialize_transaction(&tx_copy);
    preimage.extend_from_slice(&hash_type.0.to_le_bytes());
    Ok(double_sha256(&preimage))
}

fn zero_other_sequences(tx: &mut Transaction, input_index: usize) {
    for (i, input) in tx.inputs.iter_mut().enumerate() {
        if i != input_index {
            input.sequence = 0;
        }
    }
}

fn remove_codeseparators(script: &[u8]) -> Result<ByteString> {
    let ops = parse_script(script)?;
    if ops.iter().all(|op| op.opcode != OP_CODESEPARATOR) {
        return Ok(script.to_vec());
    }
    let mut out = Vec::with_capacity(script.len());
    for op in ops.iter().filter(|op| op.opcode != OP_CODESEPARATOR) {
        out.push(op.opcode);
        match op.opcode {
            OP_PUSHDATA1 => out.push(op.data.len() as u8),
            OP_PUSHDATA2 => out.extend_from_slice(&(op.data.len() as u16).to_le_bytes()),
            OP_PUSHDATA4 => out.extend_from_slice(&(op.data.len() as u32).to_le_bytes()),
            _ => {}
        }
        out.extend_from_slice(&op.data);
    }
    Ok(out)
}

/// BIP143 signature digest of input `input_index` spending `amount`.
///
/// A P2WPKH program passed as `script_code` is expanded to the matching
/// pay-to-pubkey-hash script.
pub fn calc_witness_signature_hash(
    script_code: &[u8],
    sig_hashes: &TxSigHashes,
    hash_type: SigHashType,
    tx: &Transaction,
    input_index: usize,
    amount: Integer,
) -> Result<Hash> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        SignError::SigHash(format!(
            "input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        ))
    })?;

    let base = hash_type.base_type();
    let zero = [0u8; 32];

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&(tx.version as u32).to_le_bytes());

    if hash_type.anyone_can_pay() {
        preimage.extend_from_slice(&zero);
    } else {
        preimage.extend_from_slice(&sig_hashes.hash_prevouts);
    }

    if !hash_type.anyone_can_pay() && base != SigHashType::SINGLE.0 && base != SigHashType::NONE.0 {
        preimage.extend_from_slice(&sig_hashes.hash_sequence);
    } else {
        preimage.extend_from_slice(&zero);
    }

    serialize_outpoint(&mut preimage, &input.prevout);

    if script_code.len() == 22 && script_code[0] == OP_0 && script_code[1] == 20 {
        // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
        preimage.extend_from_slice(&encode_varint(25));
        preimage.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
        preimage.extend_from_slice(&script_code[2..]);
        preimage.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    } else {
        write_var_bytes(&mut preimage, script_code);
    }

    preimage.extend_from_slice(&amount.to_le_bytes());
    preimage.extend_from_slice(&(input.sequence as u32).to_le_bytes());

    if base != SigHashType::SINGLE.0 && base != SigHashType::NONE.0 {
        preimage.extend_from_slice(&sig_hashes.hash_outputs);
    } else if base == SigHashType::SINGLE.0 && input_index < tx.outputs.len() {
        let mut output = Vec::new();
        serialize_output(&mut output, &tx.outputs[input_index]);
        preimage.extend_from_slice(&double_sha256(&output));
    } else {
        preimage.extend_from_slice(&zero);
    }

    preimage.extend_from_slice(&(tx.lock_time as u32).to_le_bytes());
    preimage.extend_from_slice(&hash_type.0.to_le_bytes());

    Ok(double_sha256(&preimage))
}

/// Digest for `sig_version`: legacy over `script_code`, or BIP143 with
/// `amount` and the precomputed midstate.
pub fn signature_hash(
    script_code: &[u8],
    sig_hashes: &TxSigHashes,
    hash_type: SigHashType,
    tx: &Transaction,
    input_index: usize,
    amount: Integer,
    sig_version: SigVersion,
) -> Result<Hash> {
    match sig_version {
        SigVersion::Base => calc_signature_hash(script_code, hash_type, tx, input_index),
        SigVersion::WitnessV0 => {
            calc_witness_signature_hash(script_code, sig_hashes, hash_type, tx, input_index, amount)
        }
    }
}

//! Segregated witness helpers: witness programs and the BIP143 midstate

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::transaction::{double_sha256, serialize_outpoint, serialize_output};
use crate::types::*;

/// A version 0..=16 witness program extracted from a locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WitnessProgram {
    pub version: u8,
    pub program: ByteString,
}

/// Extract the witness program from `script`, if it is one.
///
/// A witness program is a single version opcode (OP_0 or OP_1..OP_16)
/// followed by one direct push of 2 to 40 bytes.
pub fn witness_program(script: &[u8]) -> Option<WitnessProgram> {
    if script.len() < 4 || script.len() > 42 {
        return None;
    }
    let version = match script[0] {
        OP_0 => 0,
        op @ OP_1..=OP_16 => op - OP_1 + 1,
        _ => return None,
    };
    let push_len = script[1] as usize;
    if push_len + 2 != script.len() {
        return None;
    }
    Some(WitnessProgram {
        version,
        program: script[2..].to_vec(),
    })
}

pub fn is_witness_program(script: &[u8]) -> bool {
    witness_program(script).is_some()
}

/// Precomputed BIP143 midstate shared by every input of one transaction.
///
/// hashPrevouts = SHA256d(outpoints), hashSequence = SHA256d(sequences),
/// hashOutputs = SHA256d(outputs)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSigHashes {
    pub hash_prevouts: Hash,
    pub hash_sequence: Hash,
    pub hash_outputs: Hash,
}

impl TxSigHashes {
    pub fn new(tx: &Transaction) -> Self {
        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            serialize_outpoint(&mut prevouts, &input.prevout);
            sequences.extend_from_slice(&(input.sequence as u32).to_le_bytes());
        }

        let mut outputs = Vec::new();
        for output in &tx.outputs {
            serialize_output(&mut outputs, output);
        }

        TxSigHashes {
            hash_prevouts: double_sha256(&prevouts),
            hash_sequence: double_sha256(&sequences),
            hash_outputs: double_sha256(&outputs),
        }
    }
}

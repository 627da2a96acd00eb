//! Core transaction and script types used by the signer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Natural number type
pub type Natural = u64;

/// Integer type
pub type Integer = i64;

/// Witness data: stack of witness elements, top element last
pub type Witness = Vec<ByteString>;

/// Candidate solution for one input: data pushes in stack order, top element last
pub type UnlockingStack = Vec<ByteString>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: Natural,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: Natural,
    #[serde(default)]
    pub witness: Witness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: Integer,
    pub script_pubkey: ByteString,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: Natural,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: Natural,
}

/// Standard locking script templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    PubKeyHash,
    WitnessV0PubKeyHash,
    ScriptHash,
    WitnessV0ScriptHash,
    MultiSig,
    NullData,
}

impl fmt::Display for ScriptClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptClass::NonStandard => "nonstandard",
            ScriptClass::PubKey => "pubkey",
            ScriptClass::PubKeyHash => "pubkeyhash",
            ScriptClass::WitnessV0PubKeyHash => "witness_v0_keyhash",
            ScriptClass::ScriptHash => "scripthash",
            ScriptClass::WitnessV0ScriptHash => "witness_v0_scripthash",
            ScriptClass::MultiSig => "multisig",
            ScriptClass::NullData => "nulldata",
        };
        f.write_str(name)
    }
}

/// Signature digest algorithm version.
///
/// `Base` hashes the legacy serialization over the subscript, `WitnessV0`
/// commits to the spent amount using the BIP143 midstate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigVersion {
    Base,
    WitnessV0,
}

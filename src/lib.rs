//! # Script-Sign
//!
//! Transaction input signing for Bitcoin-style locking scripts.
//!
//! This crate produces unlocking data (script_sig and witness) for the standard
//! script classes, resolves one level of P2SH and P2WSH indirection, and merges
//! a freshly produced solution with signatures collected earlier, so that
//! several parties can complete a multisig input one signature at a time.
//!
//! ## Architecture
//!
//! - Script encoding and classification (`script`, `standard`, `address`)
//! - Signature digests (`transaction`, `segwit`, `sighash`)
//! - Signing and merging (`sign`, `merge`, `signer`)
//! - Evaluation of the produced scripts (`interpreter`, `sign_ops`)
//!
//! Keys and scripts are never stored here. They are looked up through the
//! caller supplied [`keystore::KeyDb`] and [`keystore::ScriptDb`].
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::HashMap;
//! use script_sign::ScriptSigner;
//! use script_sign::address::Address;
//! use script_sign::keystore::NoScripts;
//! use script_sign::script::pay_to_address;
//! use script_sign::sighash::SigHashType;
//! use script_sign::types::*;
//! use secp256k1::{PublicKey, Secp256k1, SecretKey};
//!
//! let key = SecretKey::from_slice(&[7u8; 32]).unwrap();
//! let pubkey = PublicKey::from_secret_key(&Secp256k1::new(), &key);
//! let address = Address::from_pubkey(&pubkey, true);
//! let pk_script = pay_to_address(&address).unwrap();
//!
//! let mut keys = HashMap::new();
//! keys.insert(address, (key, true));
//!
//! let tx = Transaction {
//!     version: 1,
//!     inputs: vec![TransactionInput {
//!         prevout: OutPoint { hash: [1; 32], index: 0 },
//!         script_sig: vec![],
//!         sequence: 0xffffffff,
//!         witness: vec![],
//!     }],
//!     outputs: vec![TransactionOutput {
//!         value: 1000,
//!         script_pubkey: vec![0x51],
//!     }],
//!     lock_time: 0,
//! };
//!
//! let signer = ScriptSigner::default();
//! let script_sig = signer
//!     .sign_tx_output(&tx, 0, &pk_script, SigHashType::ALL, &keys, &NoScripts, &[])
//!     .unwrap();
//! assert!(signer.verify_input(&tx, 0, &pk_script, 0, &script_sig, &[]).unwrap());
//! ```

pub mod types;
pub mod constants;
pub mod error;
pub mod params;
pub mod address;
pub mod script;
pub mod standard;
pub mod transaction;
pub mod segwit;
pub mod sighash;
pub mod sign_ops;
pub mod keystore;
pub mod sign;
pub mod merge;
pub mod signer;
pub mod interpreter;

// Re-export commonly used types
pub use types::*;
pub use error::{NestingViolation, Result, SignError};
pub use params::ChainParams;
pub use sighash::SigHashType;
pub use sign_ops::{SigHashCache, SignOp, SignOpCache};

use constants::STANDARD_VERIFY_FLAGS;
use keystore::{KeyDb, ScriptDb};

/// Signing entry point bound to one network's address encoding.
///
/// The network only matters for multisig merging, where signatures are
/// matched to keys by their encoded address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScriptSigner {
    params: ChainParams,
}

impl ScriptSigner {
    pub fn new(params: ChainParams) -> Self {
        ScriptSigner { params }
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Sign a legacy input, merging with `previous_script`.
    ///
    /// See [`signer::sign_tx_output`].
    #[allow(clippy::too_many_arguments)]
    pub fn sign_tx_output(
        &self,
        tx: &Transaction,
        input_index: usize,
        pk_script: &[u8],
        hash_type: SigHashType,
        kdb: &dyn KeyDb,
        sdb: &dyn ScriptDb,
        previous_script: &[u8],
    ) -> Result<ByteString> {
        signer::sign_tx_output(&self.params, tx, input_index, pk_script, hash_type, kdb, sdb, previous_script)
    }

    /// Sign any input, merging with `previous_script` and `previous_witness`.
    ///
    /// See [`signer::sign_tx_witness`].
    #[allow(clippy::too_many_arguments)]
    pub fn sign_tx_witness(
        &self,
        tx: &Transaction,
        input_index: usize,
        pk_script: &[u8],
        amount: Integer,
        hash_type: SigHashType,
        kdb: &dyn KeyDb,
        sdb: &dyn ScriptDb,
        previous_script: &[u8],
        previous_witness: &[ByteString],
    ) -> Result<(ByteString, Witness)> {
        signer::sign_tx_witness(
            &self.params,
            tx,
            input_index,
            pk_script,
            amount,
            hash_type,
            kdb,
            sdb,
            previous_script,
            previous_witness,
        )
    }

    /// Check an input's unlocking data against `pk_script` under the standard flags.
    pub fn verify_input(
        &self,
        tx: &Transaction,
        input_index: usize,
        pk_script: &[u8],
        amount: Integer,
        script_sig: &[u8],
        witness: &[ByteString],
    ) -> Result<bool> {
        interpreter::verify_script(
            script_sig,
            pk_script,
            witness,
            tx,
            input_index,
            amount,
            STANDARD_VERIFY_FLAGS,
        )
    }
}

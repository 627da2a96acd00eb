//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;

use script_sign::address::Address;
use script_sign::constants::STANDARD_VERIFY_FLAGS;
use script_sign::interpreter::verify_script;
use script_sign::types::*;
use secp256k1::{PublicKey, Secp256k1, SecretKey};

pub const AMOUNT: Integer = 50_000;

pub fn create_test_transaction() -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![
            TransactionInput {
                prevout: OutPoint { hash: [0x11; 32], index: 0 },
                script_sig: vec![],
                sequence: 0xffffffff,
                witness: vec![],
            },
            TransactionInput {
                prevout: OutPoint { hash: [0x22; 32], index: 3 },
                script_sig: vec![],
                sequence: 0xfffffffe,
                witness: vec![],
            },
        ],
        outputs: vec![
            TransactionOutput {
                value: 30_000,
                script_pubkey: vec![0x51],
            },
            TransactionOutput {
                value: 19_000,
                script_pubkey: vec![0x52],
            },
        ],
        lock_time: 0,
    }
}

pub fn test_key(seed: u8) -> (SecretKey, PublicKey) {
    let key = SecretKey::from_slice(&[seed; 32]).unwrap();
    let pubkey = PublicKey::from_secret_key(&Secp256k1::new(), &key);
    (key, pubkey)
}

/// Key store holding every address form of the keys added to it.
#[derive(Default)]
pub struct TestKeys {
    pub map: HashMap<Address, (SecretKey, bool)>,
}

impl TestKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(seeds: &[u8]) -> Self {
        let mut keys = Self::new();
        for seed in seeds {
            keys.add(*seed);
        }
        keys
    }

    pub fn add(&mut self, seed: u8) -> &mut Self {
        let (key, pubkey) = test_key(seed);
        let serialized = pubkey.serialize();
        self.map.insert(Address::from_pubkey(&pubkey, true), (key, true));
        self.map.insert(Address::from_pubkey_hash(&serialized), (key, true));
        self.map.insert(Address::from_witness_pubkey(&serialized), (key, true));
        self
    }
}

pub fn compressed(seed: u8) -> ByteString {
    test_key(seed).1.serialize().to_vec()
}

pub fn scripts(entries: &[(Address, ByteString)]) -> HashMap<Address, ByteString> {
    entries.iter().cloned().collect()
}

pub fn verifies(tx: &Transaction, pk_script: &[u8], amount: Integer, script_sig: &[u8], witness: &[ByteString]) -> bool {
    verify_script(script_sig, pk_script, witness, tx, 0, amount, STANDARD_VERIFY_FLAGS).unwrap()
}

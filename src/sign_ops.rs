//! Signature-hash cache and signing-operation log
//!
//! Both are scoped to one evaluation of one input and are filled in by the
//! interpreter as it executes OP_CHECKSIG{,VERIFY} and
//! OP_CHECKMULTISIG{,VERIFY}.

use secp256k1::PublicKey;
use std::collections::HashMap;

use crate::constants::{OP_CHECKMULTISIG, OP_CHECKMULTISIGVERIFY, OP_CHECKSIG, OP_CHECKSIGVERIFY};
use crate::error::{Result, SignError};
use crate::sighash::SigHashType;
use crate::types::Hash;

/// Signature hashes computed for one signature opcode, keyed by hash type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigHashCache {
    cache: HashMap<SigHashType, Hash>,
}

impl SigHashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `hash_type` with its signature hash.
    pub fn add(&mut self, hash_type: SigHashType, hash: Hash) {
        self.cache.insert(hash_type, hash);
    }

    pub fn contains(&self, hash_type: SigHashType) -> bool {
        self.cache.contains_key(&hash_type)
    }

    /// The cached hash for `hash_type`, if one was added.
    pub fn find(&self, hash_type: SigHashType) -> Option<&Hash> {
        self.cache.get(&hash_type)
    }

    /// Return the cached hash for `hash_type`, computing and storing it on a miss.
    pub fn get_or_compute<F>(&mut self, hash_type: SigHashType, compute: F) -> Result<Hash>
    where
        F: FnOnce() -> Result<Hash>,
    {
        if let Some(hash) = self.cache.get(&hash_type) {
            return Ok(*hash);
        }
        let hash = compute()?;
        self.cache.insert(hash_type, hash);
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// One executed signature-checking opcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOp {
    opcode: u8,
    required_sigs: usize,
    pubkeys: Vec<PublicKey>,
    sig_hashes: SigHashCache,
}

impl SignOp {
    fn new(
        opcode: u8,
        verify: bool,
        required_sigs: usize,
        sig_hashes: SigHashCache,
        pubkeys: Vec<PublicKey>,
    ) -> Self {
        // The VERIFY form of each check opcode is the next opcode value.
        let opcode = if verify { opcode + 1 } else { opcode };
        SignOp {
            opcode,
            required_sigs,
            pubkeys,
            sig_hashes,
        }
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// OP_CHECKSIG or OP_CHECKSIGVERIFY
    pub fn is_check_sig(&self) -> bool {
        self.opcode == OP_CHECKSIG || self.opcode == OP_CHECKSIGVERIFY
    }

    /// OP_CHECKMULTISIG or OP_CHECKMULTISIGVERIFY
    pub fn is_check_multisig(&self) -> bool {
        self.opcode == OP_CHECKMULTISIG || self.opcode == OP_CHECKMULTISIGVERIFY
    }

    pub fn is_verify(&self) -> bool {
        self.opcode == OP_CHECKSIGVERIFY || self.opcode == OP_CHECKMULTISIGVERIFY
    }

    pub fn required_sigs(&self) -> usize {
        self.required_sigs
    }

    pub fn keys(&self) -> &[PublicKey] {
        &self.pubkeys
    }

    pub fn sig_hashes(&self) -> &SigHashCache {
        &self.sig_hashes
    }

    /// The signature hash this operation computed for `hash_type`, if any.
    pub fn sig_hash(&self, hash_type: SigHashType) -> Option<&Hash> {
        self.sig_hashes.find(hash_type)
    }
}

/// Append-only log of the signing operations executed while evaluating one
/// input, in execution order.
#[derive(Debug, Clone, Default)]
pub struct SignOpCache {
    ops: Vec<SignOp>,
}

impl SignOpCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an OP_CHECKSIG, or OP_CHECKSIGVERIFY when `is_verify` is set.
    pub fn record_check_sig(&mut self, is_verify: bool, cache: SigHashCache, keys: Vec<PublicKey>) {
        self.ops.push(SignOp::new(OP_CHECKSIG, is_verify, 1, cache, keys));
    }

    /// Record an OP_CHECKMULTISIG, or OP_CHECKMULTISIGVERIFY when `is_verify` is set.
    pub fn record_check_multisig(
        &mut self,
        is_verify: bool,
        cache: SigHashCache,
        required_sigs: usize,
        keys: Vec<PublicKey>,
    ) {
        self.ops.push(SignOp::new(OP_CHECKMULTISIG, is_verify, required_sigs, cache, keys));
    }

    /// The operation at `index`; valid indices are `0..len()`.
    pub fn op_at(&self, index: usize) -> Result<&SignOp> {
        self.ops.get(index).ok_or(SignError::OutOfRange {
            index,
            len: self.ops.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignOp> {
        self.ops.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::{Secp256k1, SecretKey};

    fn test_key(seed: u8) -> PublicKey {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[seed; 32]).unwrap();
        PublicKey::from_secret_key(&secp, &sk)
    }

    #[test]
    fn test_sig_hash_cache_add_contains_find() {
        let mut cache = SigHashCache::new();
        assert!(!cache.contains(SigHashType::ALL));
        assert!(cache.find(SigHashType::ALL).is_none());

        cache.add(SigHashType::ALL, [7u8; 32]);
        assert!(cache.contains(SigHashType::ALL));
        assert_eq!(cache.find(SigHashType::ALL), Some(&[7u8; 32]));
        assert!(!cache.contains(SigHashType::NONE));
    }

    #[test]
    fn test_sig_hash_cache_get_or_compute_runs_once() {
        let mut cache = SigHashCache::new();
        let mut calls = 0;
        let first = cache
            .get_or_compute(SigHashType::ALL, || {
                calls += 1;
                Ok([1u8; 32])
            })
            .unwrap();
        let second = cache
            .get_or_compute(SigHashType::ALL, || {
                calls += 1;
                Ok([2u8; 32])
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sign_op_verify_opcode_is_base_plus_one() {
        let mut log = SignOpCache::new();
        log.record_check_sig(false, SigHashCache::new(), vec![test_key(1)]);
        log.record_check_sig(true, SigHashCache::new(), vec![test_key(1)]);
        log.record_check_multisig(false, SigHashCache::new(), 2, vec![test_key(1), test_key(2)]);
        log.record_check_multisig(true, SigHashCache::new(), 1, vec![test_key(3)]);

        assert_eq!(log.op_at(0).unwrap().opcode(), OP_CHECKSIG);
        assert_eq!(log.op_at(1).unwrap().opcode(), OP_CHECKSIGVERIFY);
        assert_eq!(log.op_at(2).unwrap().opcode(), OP_CHECKMULTISIG);
        assert_eq!(log.op_at(3).unwrap().opcode(), OP_CHECKMULTISIGVERIFY);

        assert!(log.op_at(1).unwrap().is_check_sig());
        assert!(log.op_at(1).unwrap().is_verify());
        assert!(log.op_at(2).unwrap().is_check_multisig());
        assert!(!log.op_at(2).unwrap().is_verify());
    }

    #[test]
    fn test_sign_op_required_sigs_and_keys() {
        let mut log = SignOpCache::new();
        log.record_check_sig(false, SigHashCache::new(), vec![test_key(4)]);
        log.record_check_multisig(false, SigHashCache::new(), 2, vec![test_key(1), test_key(2), test_key(3)]);

        assert_eq!(log.op_at(0).unwrap().required_sigs(), 1);
        assert_eq!(log.op_at(1).unwrap().required_sigs(), 2);
        assert_eq!(log.op_at(1).unwrap().keys().len(), 3);
        assert_eq!(log.op_at(1).unwrap().keys()[0], test_key(1));
    }

    #[test]
    fn test_sign_op_exposes_cached_hash() {
        let mut cache = SigHashCache::new();
        cache.add(SigHashType::SINGLE, [3u8; 32]);
        let mut log = SignOpCache::new();
        log.record_check_sig(false, cache, vec![]);

        let op = log.op_at(0).unwrap();
        assert_eq!(op.sig_hash(SigHashType::SINGLE), Some(&[3u8; 32]));
        assert!(op.sig_hash(SigHashType::ALL).is_none());
    }

    #[test]
    fn test_op_at_bounds() {
        let mut log = SignOpCache::new();
        assert!(log.op_at(0).is_err());

        for i in 0..3 {
            log.record_check_multisig(false, SigHashCache::new(), i + 1, vec![]);
        }
        for i in 0..3 {
            assert_eq!(log.op_at(i).unwrap().required_sigs(), i + 1);
        }
        match log.op_at(3) {
            Err(SignError::OutOfRange { index, len }) => {
                assert_eq!(index, 3);
                assert_eq!(len, 3);
            }
            other => panic!("expected out of range, got {:?}", other),
        }
        assert!(log.op_at(usize::MAX).is_err());
    }
}

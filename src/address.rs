//! Payment destinations extracted from locking scripts

use bech32::{u5, ToBase32, Variant};
use ripemd::Ripemd160;
use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, SignError};
use crate::params::ChainParams;
use crate::types::{ByteString, Hash};

/// RIPEMD160(SHA256(x))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha256_hash = Sha256::digest(data);
    let ripemd160_hash = Ripemd160::digest(sha256_hash);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripemd160_hash);
    out
}

/// SHA256(x)
pub fn sha256(data: &[u8]) -> Hash {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// A destination a locking script pays to.
///
/// `PubKey` is the only variant that carries the public key itself; multisig
/// scripts classify into a list of these so signatures can be matched to keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    PubKeyHash([u8; 20]),
    ScriptHash([u8; 20]),
    PubKey(ByteString),
    WitnessPubKeyHash([u8; 20]),
    WitnessScriptHash([u8; 32]),
}

impl Address {
    /// Pay-to-pubkey address for the serialized form of `key`.
    pub fn from_pubkey(key: &PublicKey, compressed: bool) -> Self {
        if compressed {
            Address::PubKey(key.serialize().to_vec())
        } else {
            Address::PubKey(key.serialize_uncompressed().to_vec())
        }
    }

    pub fn from_pubkey_hash(serialized_pubkey: &[u8]) -> Self {
        Address::PubKeyHash(hash160(serialized_pubkey))
    }

    /// P2SH address committing to `redeem_script`.
    pub fn from_script(redeem_script: &[u8]) -> Self {
        Address::ScriptHash(hash160(redeem_script))
    }

    pub fn from_witness_pubkey(serialized_pubkey: &[u8]) -> Self {
        Address::WitnessPubKeyHash(hash160(serialized_pubkey))
    }

    /// P2WSH address committing to `witness_script`.
    pub fn from_witness_script(witness_script: &[u8]) -> Self {
        Address::WitnessScriptHash(sha256(witness_script))
    }

    /// The embedded public key, if this is a pay-to-pubkey address holding a
    /// valid key.
    pub fn pubkey(&self) -> Option<PublicKey> {
        match self {
            Address::PubKey(bytes) => PublicKey::from_slice(bytes).ok(),
            _ => None,
        }
    }

    /// Textual form of the address for `params`.
    ///
    /// Pay-to-pubkey addresses encode as the P2PKH address of their
    /// serialized key, so compressed and uncompressed forms stay distinct.
    pub fn encode(&self, params: &ChainParams) -> Result<String> {
        match self {
            Address::PubKeyHash(hash) => Ok(encode_base58(params.pubkey_hash_addr_id, hash)),
            Address::ScriptHash(hash) => Ok(encode_base58(params.script_hash_addr_id, hash)),
            Address::PubKey(bytes) => Ok(encode_base58(params.pubkey_hash_addr_id, &hash160(bytes))),
            Address::WitnessPubKeyHash(program) => encode_segwit(params.bech32_hrp, program),
            Address::WitnessScriptHash(program) => encode_segwit(params.bech32_hrp, program),
        }
    }
}

fn encode_base58(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len());
    data.push(version);
    data.extend_from_slice(payload);
    bs58::encode(data).with_check().into_string()
}

fn encode_segwit(hrp: &str, program: &[u8]) -> Result<String> {
    let version = u5::try_from_u8(0).map_err(|e| SignError::Encoding(e.to_string()))?;
    let mut data = vec![version];
    data.extend(program.to_base32());
    bech32::encode(hrp, data, Variant::Bech32).map_err(|e| SignError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MAINNET, TESTNET};
    use secp256k1::{Secp256k1, SecretKey};

    #[test]
    fn test_hash160_length() {
        assert_eq!(hash160(&[0x51]).len(), 20);
    }

    #[test]
    fn test_encode_p2pkh_mainnet_prefix() {
        // hash160 of the all-zero payload encodes to the well-known burn prefix
        let address = Address::PubKeyHash([0u8; 20]);
        let encoded = address.encode(&MAINNET).unwrap();
        assert_eq!(encoded, "1111111111111111111114oLvT2");
    }

    #[test]
    fn test_encode_p2sh_prefix() {
        let address = Address::ScriptHash([0u8; 20]);
        assert!(address.encode(&MAINNET).unwrap().starts_with('3'));
        assert!(address.encode(&TESTNET).unwrap().starts_with('2'));
    }

    #[test]
    fn test_encode_witness_addresses() {
        let wpkh = Address::WitnessPubKeyHash([0u8; 20]);
        assert!(wpkh.encode(&MAINNET).unwrap().starts_with("bc1q"));
        let wsh = Address::WitnessScriptHash([0u8; 32]);
        assert!(wsh.encode(&TESTNET).unwrap().starts_with("tb1q"));
    }

    #[test]
    fn test_pubkey_address_formats_are_distinct() {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&[7u8; 32]).unwrap();
        let pk = PublicKey::from_secret_key(&secp, &sk);

        let compressed = Address::from_pubkey(&pk, true);
        let uncompressed = Address::from_pubkey(&pk, false);
        assert_ne!(compressed.encode(&MAINNET).unwrap(), uncompressed.encode(&MAINNET).unwrap());
        assert_eq!(compressed.pubkey(), Some(pk));
        assert_eq!(uncompressed.pubkey(), Some(pk));
    }

    #[test]
    fn test_pubkey_only_for_pubkey_variant() {
        assert!(Address::PubKeyHash([1u8; 20]).pubkey().is_none());
        assert!(Address::PubKey(vec![0x02; 10]).pubkey().is_none());
    }
}

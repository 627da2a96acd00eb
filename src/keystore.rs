//! Key and script lookup capabilities supplied by the caller

use secp256k1::SecretKey;
use std::collections::HashMap;

use crate::address::Address;
use crate::error::{Result, SignError};
use crate::types::ByteString;

/// Resolves an address to the private key that controls it, plus whether the
/// matching public key is serialized compressed.
pub trait KeyDb {
    fn get_key(&self, address: &Address) -> Result<(SecretKey, bool)>;
}

/// Resolves a P2SH or P2WSH address to its redeem or witness script.
pub trait ScriptDb {
    fn get_script(&self, address: &Address) -> Result<ByteString>;
}

/// [`KeyDb`] backed by a closure.
pub struct KeyClosure<F>(pub F);

impl<F> KeyDb for KeyClosure<F>
where
    F: Fn(&Address) -> Result<(SecretKey, bool)>,
{
    fn get_key(&self, address: &Address) -> Result<(SecretKey, bool)> {
        (self.0)(address)
    }
}

/// [`ScriptDb`] backed by a closure.
pub struct ScriptClosure<F>(pub F);

impl<F> ScriptDb for ScriptClosure<F>
where
    F: Fn(&Address) -> Result<ByteString>,
{
    fn get_script(&self, address: &Address) -> Result<ByteString> {
        (self.0)(address)
    }
}

impl KeyDb for HashMap<Address, (SecretKey, bool)> {
    fn get_key(&self, address: &Address) -> Result<(SecretKey, bool)> {
        self.get(address)
            .copied()
            .ok_or_else(|| SignError::KeyNotFound(format!("{:?}", address)))
    }
}

impl ScriptDb for HashMap<Address, ByteString> {
    fn get_script(&self, address: &Address) -> Result<ByteString> {
        self.get(address)
            .cloned()
            .ok_or_else(|| SignError::ScriptNotFound(format!("{:?}", address)))
    }
}

/// Key store that knows no keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKeys;

impl KeyDb for NoKeys {
    fn get_key(&self, address: &Address) -> Result<(SecretKey, bool)> {
        Err(SignError::KeyNotFound(format!("{:?}", address)))
    }
}

/// Script store that knows no scripts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoScripts;

impl ScriptDb for NoScripts {
    fn get_script(&self, address: &Address) -> Result<ByteString> {
        Err(SignError::ScriptNotFound(format!("{:?}", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_closure() {
        let sk = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let target = Address::PubKeyHash([1u8; 20]);
        let expected = target.clone();
        let kdb = KeyClosure(move |addr: &Address| {
            if *addr == expected {
                Ok((sk, true))
            } else {
                Err(SignError::KeyNotFound("unknown".to_string()))
            }
        });

        assert_eq!(kdb.get_key(&target).unwrap(), (sk, true));
        assert!(matches!(
            kdb.get_key(&Address::PubKeyHash([2u8; 20])),
            Err(SignError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_script_map_lookup() {
        let mut sdb: HashMap<Address, ByteString> = HashMap::new();
        let script = vec![0x51];
        let address = Address::from_script(&script);
        sdb.insert(address.clone(), script.clone());

        assert_eq!(sdb.get_script(&address).unwrap(), script);
        assert!(matches!(
            sdb.get_script(&Address::ScriptHash([0u8; 20])),
            Err(SignError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn test_empty_stores() {
        assert!(NoKeys.get_key(&Address::PubKeyHash([0u8; 20])).is_err());
        assert!(NoScripts.get_script(&Address::ScriptHash([0u8; 20])).is_err());
    }
}

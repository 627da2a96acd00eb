//! Signature production and per-class signing dispatch

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use tracing::{debug, trace};

use crate::address::Address;
use crate::error::{Result, SignError};
use crate::keystore::{KeyDb, ScriptDb};
use crate::script::push_stack_script;
use crate::segwit::TxSigHashes;
use crate::sighash::{calc_signature_hash, calc_witness_signature_hash, signature_hash, SigHashType};
use crate::standard::extract_pk_script_addrs;
use crate::types::*;

/// Everything about the spend that a signature commits to, apart from the
/// script code and digest version.
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub tx: &'a Transaction,
    pub sig_hashes: &'a TxSigHashes,
    pub input_index: usize,
    pub amount: Integer,
    pub hash_type: SigHashType,
}

impl<'a> SigningContext<'a> {
    pub fn new(
        tx: &'a Transaction,
        sig_hashes: &'a TxSigHashes,
        input_index: usize,
        amount: Integer,
        hash_type: SigHashType,
    ) -> Self {
        SigningContext {
            tx,
            sig_hashes,
            input_index,
            amount,
            hash_type,
        }
    }

    /// Signature digest of `script_code` for an explicit hash type.
    pub fn digest(&self, script_code: &[u8], hash_type: SigHashType, sig_version: SigVersion) -> Result<Hash> {
        signature_hash(
            script_code,
            self.sig_hashes,
            hash_type,
            self.tx,
            self.input_index,
            self.amount,
            sig_version,
        )
    }
}

/// Result of signing one locking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignOutcome {
    pub stack: UnlockingStack,
    pub class: ScriptClass,
    pub addresses: Vec<Address>,
    pub n_required: usize,
}

/// DER(sign(key, digest)) || hash_type
fn sign_digest(digest: &Hash, hash_type: SigHashType, key: &SecretKey) -> Result<ByteString> {
    let secp = Secp256k1::signing_only();
    let message = Message::from_digest_slice(digest)
        .map_err(|e| SignError::Signing(format!("cannot sign tx input: {}", e)))?;
    let signature = secp.sign_ecdsa(&message, key);

    let mut encoded = signature.serialize_der().to_vec();
    encoded.push(hash_type.to_sig_byte()?);
    Ok(encoded)
}

/// Serialized legacy signature for input `input_index`, with `hash_type` appended.
pub fn raw_tx_in_signature(
    tx: &Transaction,
    input_index: usize,
    sub_script: &[u8],
    hash_type: SigHashType,
    key: &SecretKey,
) -> Result<ByteString> {
    let hash = calc_signature_hash(sub_script, hash_type, tx, input_index)?;
    sign_digest(&hash, hash_type, key)
}

/// Serialized BIP143 signature for input `input_index`, with `hash_type` appended.
pub fn raw_tx_in_witness_signature(
    tx: &Transaction,
    sig_hashes: &TxSigHashes,
    input_index: usize,
    amount: Integer,
    sub_script: &[u8],
    hash_type: SigHashType,
    key: &SecretKey,
) -> Result<ByteString> {
    let hash = calc_witness_signature_hash(sub_script, sig_hashes, hash_type, tx, input_index, amount)?;
    sign_digest(&hash, hash_type, key)
}

pub fn make_signature(
    ctx: &SigningContext<'_>,
    sub_script: &[u8],
    sig_version: SigVersion,
    key: &SecretKey,
) -> Result<ByteString> {
    let hash = ctx.digest(sub_script, ctx.hash_type, sig_version)?;
    sign_digest(&hash, ctx.hash_type, key)
}

fn serialize_pubkey(key: &SecretKey, compressed: bool) -> ByteString {
    let secp = Secp256k1::signing_only();
    let pubkey = PublicKey::from_secret_key(&secp, key);
    if compressed {
        pubkey.serialize().to_vec()
    } else {
        pubkey.serialize_uncompressed().to_vec()
    }
}

/// `[sig]` for a pay-to-pubkey script.
pub fn sign_p2pk(
    ctx: &SigningContext<'_>,
    sub_script: &[u8],
    sig_version: SigVersion,
    key: &SecretKey,
) -> Result<UnlockingStack> {
    Ok(vec![make_signature(ctx, sub_script, sig_version, key)?])
}

/// `[sig, pubkey]` for a pay-to-pubkey-hash or P2WPKH script.
///
/// `compressed` must match the key format the address was derived from, or
/// the hash check in the locking script will fail.
pub fn sign_p2pkh(
    ctx: &SigningContext<'_>,
    sub_script: &[u8],
    sig_version: SigVersion,
    key: &SecretKey,
    compressed: bool,
) -> Result<UnlockingStack> {
    let sig = make_signature(ctx, sub_script, sig_version, key)?;
    Ok(vec![sig, serialize_pubkey(key, compressed)])
}

/// Sign as many of the multisig `addresses` as the key store allows, up to
/// `n_required`, in script order.
///
/// The stack starts with an empty element consumed by the extra pop in
/// OP_CHECKMULTISIG. The flag reports whether `n_required` signatures were
/// produced; a partial stack is not an error.
pub fn sign_multisig(
    ctx: &SigningContext<'_>,
    sub_script: &[u8],
    sig_version: SigVersion,
    addresses: &[Address],
    n_required: usize,
    kdb: &dyn KeyDb,
) -> (UnlockingStack, bool) {
    let mut stack: UnlockingStack = vec![vec![]];
    let mut signed = 0usize;

    for address in addresses {
        if signed == n_required {
            break;
        }
        let key = match kdb.get_key(address) {
            Ok((key, _)) => key,
            Err(err) => {
                trace!(?address, %err, "skipping multisig key");
                continue;
            }
        };
        match make_signature(ctx, sub_script, sig_version, &key) {
            Ok(sig) => {
                stack.push(sig);
                signed += 1;
            }
            Err(err) => trace!(?address, %err, "multisig signing attempt failed"),
        }
    }

    debug!(signed, n_required, "produced multisig signatures");
    (stack, signed == n_required)
}

fn first_address(addresses: &[Address], class: ScriptClass) -> Result<&Address> {
    addresses.first().ok_or_else(|| {
        let reason = format!("no usable address in {} script", class);
        match class {
            ScriptClass::ScriptHash | ScriptClass::WitnessV0ScriptHash => SignError::ScriptNotFound(reason),
            _ => SignError::KeyNotFound(reason),
        }
    })
}

/// Classify `sub_script` and produce a candidate unlocking stack for it.
///
/// Script-hash classes return the resolved redeem or witness script as a
/// one-element stack for the caller to recurse into.
pub fn sign(
    ctx: &SigningContext<'_>,
    sub_script: &[u8],
    sig_version: SigVersion,
    kdb: &dyn KeyDb,
    sdb: &dyn ScriptDb,
) -> Result<SignOutcome> {
    let (class, addresses, n_required) = extract_pk_script_addrs(sub_script)?;
    debug!(%class, ?sig_version, input = ctx.input_index, "signing script");

    let stack = match class {
        ScriptClass::PubKey => {
            let (key, _) = kdb.get_key(first_address(&addresses, class)?)?;
            sign_p2pk(ctx, sub_script, sig_version, &key)?
        }
        ScriptClass::PubKeyHash | ScriptClass::WitnessV0PubKeyHash => {
            let (key, compressed) = kdb.get_key(first_address(&addresses, class)?)?;
            sign_p2pkh(ctx, sub_script, sig_version, &key, compressed)?
        }
        ScriptClass::ScriptHash | ScriptClass::WitnessV0ScriptHash => {
            let script = sdb.get_script(first_address(&addresses, class)?)?;
            vec![script]
        }
        ScriptClass::MultiSig => {
            let (stack, _) = sign_multisig(ctx, sub_script, sig_version, &addresses, n_required, kdb);
            stack
        }
        ScriptClass::NullData | ScriptClass::NonStandard => {
            return Err(SignError::UnsupportedScript(class));
        }
    };

    Ok(SignOutcome {
        stack,
        class,
        addresses,
        n_required,
    })
}

/// Legacy script_sig spending a pay-to-pubkey-hash output with `key`.
pub fn signature_script(
    tx: &Transaction,
    input_index: usize,
    sub_script: &[u8],
    hash_type: SigHashType,
    key: &SecretKey,
    compress: bool,
) -> Result<ByteString> {
    let sig_hashes = TxSigHashes::new(tx);
    let ctx = SigningContext::new(tx, &sig_hashes, input_index, 0, hash_type);
    let stack = sign_p2pkh(&ctx, sub_script, SigVersion::Base, key, compress)?;
    push_stack_script(&stack)
}

/// Witness spending a P2WPKH output with `key`, using the BIP143 digest.
#[allow(clippy::too_many_arguments)]
pub fn witness_signature(
    tx: &Transaction,
    sig_hashes: &TxSigHashes,
    input_index: usize,
    amount: Integer,
    sub_script: &[u8],
    hash_type: SigHashType,
    key: &SecretKey,
    compress: bool,
) -> Result<Witness> {
    let ctx = SigningContext::new(tx, sig_hashes, input_index, amount, hash_type);
    sign_p2pkh(&ctx, sub_script, SigVersion::WitnessV0, key, compress)
}

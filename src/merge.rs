//! Reconciliation of two partial solutions for the same output

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::address::Address;
use crate::error::{Result, SignError};
use crate::params::ChainParams;
use crate::sign::SigningContext;
use crate::sign_ops::SigHashCache;
use crate::sighash::SigHashType;
use crate::types::*;

/// Merge `stack` and `prev_stack`, both partial solutions for `pk_script`.
///
/// `class`, `addresses` and `n_required` must be the classification of
/// `pk_script`; passing values for a different script gives an unspecified
/// result.
///
/// Only multisig has a real merge. Every other class has at most one valid
/// solution, so the longer stack is kept, with `stack` winning ties.
#[allow(clippy::too_many_arguments)]
pub fn merge_scripts(
    ctx: &SigningContext<'_>,
    params: &ChainParams,
    sig_version: SigVersion,
    pk_script: &[u8],
    class: ScriptClass,
    addresses: &[Address],
    n_required: usize,
    stack: UnlockingStack,
    prev_stack: UnlockingStack,
) -> Result<UnlockingStack> {
    match class {
        ScriptClass::MultiSig => merge_multisig(
            ctx,
            params,
            sig_version,
            pk_script,
            addresses,
            n_required,
            stack,
            prev_stack,
        ),
        ScriptClass::PubKey
        | ScriptClass::PubKeyHash
        | ScriptClass::WitnessV0PubKeyHash
        | ScriptClass::ScriptHash
        | ScriptClass::WitnessV0ScriptHash
        | ScriptClass::NullData
        | ScriptClass::NonStandard => {
            if stack.len() >= prev_stack.len() {
                Ok(stack)
            } else {
                trace!(%class, "keeping longer previous stack");
                Ok(prev_stack)
            }
        }
    }
}

/// Combine the signatures of two multisig stacks for `pk_script`.
///
/// Every candidate signature is checked against every address key with the
/// digest of its own hash type. A signature binds to the first key it
/// verifies against, and a key keeps the first signature bound to it, so
/// signatures from `stack` win over those from `prev_stack`. The result
/// lists at most `n_required` signatures in address order behind the
/// leading dummy element, padded with empty elements.
#[allow(clippy::too_many_arguments)]
pub fn merge_multisig(
    ctx: &SigningContext<'_>,
    params: &ChainParams,
    sig_version: SigVersion,
    pk_script: &[u8],
    addresses: &[Address],
    n_required: usize,
    stack: UnlockingStack,
    prev_stack: UnlockingStack,
) -> Result<UnlockingStack> {
    if stack.is_empty() {
        return Ok(prev_stack);
    }

    let secp = Secp256k1::verification_only();
    let keys = addresses
        .iter()
        .map(|address| Ok((address.encode(params)?, address.pubkey())))
        .collect::<Result<Vec<(String, Option<PublicKey>)>>>()?;

    // Hash types may differ between candidates, so digests are cached per
    // hash type and never shared across types.
    let mut digests = SigHashCache::new();
    let mut addr_to_sig: HashMap<String, ByteString> = HashMap::new();

    for sig in stack.iter().chain(prev_stack.iter()) {
        let Some((hash_type_byte, der)) = sig.split_last() else {
            continue;
        };
        let hash_type = SigHashType::from_sig_byte(*hash_type_byte);

        let mut parsed = match Signature::from_der(der) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };
        parsed.normalize_s();

        let digest = digests.get_or_compute(hash_type, || ctx.digest(pk_script, hash_type, sig_version))?;
        let message = Message::from_digest_slice(&digest).map_err(|e| SignError::SigHash(e.to_string()))?;

        for (encoded, pubkey) in &keys {
            let Some(pubkey) = pubkey else {
                continue;
            };
            if secp.verify_ecdsa(&message, &parsed, pubkey).is_ok() {
                addr_to_sig.entry(encoded.clone()).or_insert_with(|| sig.clone());
                break;
            }
        }
    }

    let mut merged: UnlockingStack = vec![vec![]];
    let mut done = 0usize;
    for (encoded, _) in &keys {
        if done == n_required {
            break;
        }
        if let Some(sig) = addr_to_sig.get(encoded) {
            merged.push(sig.clone());
            done += 1;
        }
    }
    merged.extend(std::iter::repeat(Vec::new()).take(n_required - done));

    debug!(matched = done, n_required, "merged multisig signatures");
    Ok(merged)
}

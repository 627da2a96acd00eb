//! Top-level signing: script-hash resolution, digest version selection and
//! merging with previously collected signatures

use tracing::debug;

use crate::error::{NestingViolation, Result, SignError};
use crate::keystore::{KeyDb, ScriptDb};
use crate::merge::merge_scripts;
use crate::params::ChainParams;
use crate::script::{pushed_data, ScriptBuilder};
use crate::segwit::TxSigHashes;
use crate::sighash::SigHashType;
use crate::sign::{sign, sign_p2pkh, SigningContext};
use crate::types::*;

fn take_script(stack: UnlockingStack, class: ScriptClass) -> Result<ByteString> {
    stack
        .into_iter()
        .next()
        .ok_or_else(|| SignError::ScriptNotFound(format!("no script resolved for {} output", class)))
}

/// Sign input `input_index` of `tx` spending `pk_script`, returning the
/// script_sig and witness for that input.
///
/// Keys come from `kdb`, redeem and witness scripts from `sdb`. Signatures
/// already present in `previous_script` / `previous_witness` are merged with
/// the new ones according to the script class. One level of P2SH and one
/// level of P2WSH are resolved (P2SH-wrapped P2WSH is allowed); any deeper
/// nesting fails.
#[allow(clippy::too_many_arguments)]
pub fn sign_tx_witness(
    params: &ChainParams,
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
    let sig_hashes = TxSigHashes::new(tx);
    let ctx = SigningContext::new(tx, &sig_hashes, input_index, amount, hash_type);

    let mut sig_version = SigVersion::Base;
    let mut script_code = pk_script.to_vec();
    let mut redeem_script = None;
    let mut witness_script = None;
    let mut prev_stack = pushed_data(previous_script)?;
    let mut prev_witness = previous_witness.to_vec();

    let mut outcome = sign(&ctx, pk_script, sig_version, kdb, sdb)?;

    if outcome.class == ScriptClass::ScriptHash {
        let redeem = take_script(outcome.stack, outcome.class)?;
        outcome = sign(&ctx, &redeem, sig_version, kdb, sdb)?;
        if outcome.class == ScriptClass::ScriptHash {
            return Err(NestingViolation::P2shInP2sh.into());
        }
        debug!(inner = %outcome.class, "resolved P2SH redeem script");

        // The redeem script is re-appended once below.
        if prev_stack.last() == Some(&redeem) {
            prev_stack.pop();
        }
        script_code = redeem.clone();
        redeem_script = Some(redeem);
    }

    let class = outcome.class;
    match class {
        ScriptClass::WitnessV0ScriptHash => {
            sig_version = SigVersion::WitnessV0;
            let witness = take_script(outcome.stack, class)?;
            outcome = sign(&ctx, &witness, sig_version, kdb, sdb)?;
            match outcome.class {
                ScriptClass::ScriptHash => return Err(NestingViolation::P2shInP2wsh.into()),
                ScriptClass::WitnessV0ScriptHash => return Err(NestingViolation::P2wshInP2wsh.into()),
                _ => {}
            }
            debug!(inner = %outcome.class, "resolved P2WSH witness script");

            if prev_witness.last() == Some(&witness) {
                prev_witness.pop();
            }
            script_code = witness.clone();
            witness_script = Some(witness);
        }
        ScriptClass::WitnessV0PubKeyHash => {
            sig_version = SigVersion::WitnessV0;
            let address = outcome.addresses.first().ok_or_else(|| {
                SignError::KeyNotFound("no address in witness pubkey hash script".to_string())
            })?;
            let (key, compressed) = kdb.get_key(address)?;
            outcome.stack = sign_p2pkh(&ctx, &script_code, sig_version, &key, compressed)?;
        }
        _ => {}
    }

    let (script_stack, mut witness) = match sig_version {
        SigVersion::Base => {
            let merged = merge_scripts(
                &ctx,
                params,
                sig_version,
                &script_code,
                outcome.class,
                &outcome.addresses,
                outcome.n_required,
                outcome.stack,
                prev_stack,
            )?;
            (merged, Witness::new())
        }
        SigVersion::WitnessV0 => {
            let merged = merge_scripts(
                &ctx,
                params,
                sig_version,
                &script_code,
                outcome.class,
                &outcome.addresses,
                outcome.n_required,
                outcome.stack,
                prev_witness,
            )?;
            (UnlockingStack::new(), merged)
        }
    };

    let mut builder = script_stack
        .iter()
        .fold(ScriptBuilder::new(), |builder, element| builder.push_data(element));
    if let Some(redeem) = &redeem_script {
        builder = builder.push_data(redeem);
    }
    let script = builder.into_script()?;

    if let Some(witness_script) = witness_script {
        witness.push(witness_script);
    }

    Ok((script, witness))
}

/// Sign a non-witness input, returning only its script_sig.
///
/// Witness outputs can still be passed; their witness is discarded, so the
/// caller should use [`sign_tx_witness`] for those.
#[allow(clippy::too_many_arguments)]
pub fn sign_tx_output(
    params: &ChainParams,
    tx: &Transaction,
    input_index: usize,
    pk_script: &[u8],
    hash_type: SigHashType,
    kdb: &dyn KeyDb,
    sdb: &dyn ScriptDb,
    previous_script: &[u8],
) -> Result<ByteString> {
    let (script, _) = sign_tx_witness(
        params,
        tx,
        input_index,
        pk_script,
        0,
        hash_type,
        kdb,
        sdb,
        previous_script,
        &[],
    )?;
    Ok(script)
}

//! Locking script classification and address extraction

use secp256k1::PublicKey;

use crate::address::Address;
use crate::constants::*;
use crate::error::Result;
use crate::script::{is_push_only, parse_script, ParsedOpcode};
use crate::types::ScriptClass;

/// Classify `script` and extract the addresses it pays to together with the
/// number of signatures required to spend it.
///
/// Non-standard scripts yield `(NonStandard, [], 0)`. Only scripts that fail
/// to parse are errors.
pub fn extract_pk_script_addrs(script: &[u8]) -> Result<(ScriptClass, Vec<Address>, usize)> {
    let ops = parse_script(script)?;

    if is_pubkey_hash(&ops) {
        let hash = to_array20(&ops[2].data);
        return Ok((ScriptClass::PubKeyHash, vec![Address::PubKeyHash(hash)], 1));
    }

    if is_witness_pubkey_hash(&ops) {
        let hash = to_array20(&ops[1].data);
        return Ok((ScriptClass::WitnessV0PubKeyHash, vec![Address::WitnessPubKeyHash(hash)], 1));
    }

    if is_pubkey(&ops) {
        let addresses = match PublicKey::from_slice(&ops[0].data) {
            Ok(_) => vec![Address::PubKey(ops[0].data.clone())],
            Err(_) => vec![],
        };
        return Ok((ScriptClass::PubKey, addresses, 1));
    }

    if is_script_hash(&ops) {
        let hash = to_array20(&ops[1].data);
        return Ok((ScriptClass::ScriptHash, vec![Address::ScriptHash(hash)], 1));
    }

    if is_witness_script_hash(&ops) {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&ops[1].data);
        return Ok((ScriptClass::WitnessV0ScriptHash, vec![Address::WitnessScriptHash(hash)], 1));
    }

    if let Some((n_required, keys)) = multisig_parts(&ops) {
        // Invalid keys are left out of the address list; the script may still
        // be satisfiable by the remaining ones.
        let addresses = keys
            .iter()
            .filter(|key| PublicKey::from_slice(key).is_ok())
            .map(|key| Address::PubKey(key.to_vec()))
            .collect();
        return Ok((ScriptClass::MultiSig, addresses, n_required));
    }

    if is_null_data(script, &ops) {
        return Ok((ScriptClass::NullData, vec![], 0));
    }

    Ok((ScriptClass::NonStandard, vec![], 0))
}

/// Classify `script` without extracting addresses.
pub fn get_script_class(script: &[u8]) -> ScriptClass {
    extract_pk_script_addrs(script)
        .map(|(class, _, _)| class)
        .unwrap_or(ScriptClass::NonStandard)
}

fn to_array20(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(data);
    out
}

fn is_direct_push(op: &ParsedOpcode, len: usize) -> bool {
    op.opcode as usize == len && op.data.len() == len
}

fn is_pubkey_hash(ops: &[ParsedOpcode]) -> bool {
    ops.len() == 5
        && ops[0].opcode == OP_DUP
        && ops[1].opcode == OP_HASH160
        && is_direct_push(&ops[2], 20)
        && ops[3].opcode == OP_EQUALVERIFY
        && ops[4].opcode == OP_CHECKSIG
}

fn is_script_hash(ops: &[ParsedOpcode]) -> bool {
    ops.len() == 3
        && ops[0].opcode == OP_HASH160
        && is_direct_push(&ops[1], 20)
        && ops[2].opcode == OP_EQUAL
}

fn is_witness_pubkey_hash(ops: &[ParsedOpcode]) -> bool {
    ops.len() == 2 && ops[0].opcode == OP_0 && is_direct_push(&ops[1], 20)
}

fn is_witness_script_hash(ops: &[ParsedOpcode]) -> bool {
    ops.len() == 2 && ops[0].opcode == OP_0 && is_direct_push(&ops[1], 32)
}

fn is_pubkey(ops: &[ParsedOpcode]) -> bool {
    ops.len() == 2
        && (is_direct_push(&ops[0], 33) || is_direct_push(&ops[0], 65))
        && ops[1].opcode == OP_CHECKSIG
}

fn small_int(op: &ParsedOpcode) -> Option<usize> {
    match op.opcode {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((op.opcode - OP_1 + 1) as usize),
        _ => None,
    }
}

/// `(n_required, keys)` when `ops` is `m <key>... n OP_CHECKMULTISIG`.
fn multisig_parts(ops: &[ParsedOpcode]) -> Option<(usize, Vec<&[u8]>)> {
    if ops.len() < 4 || ops[ops.len() - 1].opcode != OP_CHECKMULTISIG {
        return None;
    }
    let n_required = small_int(&ops[0])?;
    let n_keys = small_int(&ops[ops.len() - 2])?;
    let key_ops = &ops[1..ops.len() - 2];

    if n_required == 0 || n_keys != key_ops.len() || n_required > n_keys {
        return None;
    }
    if n_keys > MAX_PUBKEYS_PER_MULTISIG {
        return None;
    }
    if !key_ops
        .iter()
        .all(|op| is_direct_push(op, 33) || is_direct_push(op, 65))
    {
        return None;
    }

    Some((n_required, key_ops.iter().map(|op| op.data.as_slice()).collect()))
}

fn is_null_data(script: &[u8], ops: &[ParsedOpcode]) -> bool {
    !ops.is_empty()
        && ops[0].opcode == OP_RETURN
        && is_push_only(&ops[1..])
        && script.len() <= MAX_DATA_CARRIER_SIZE + 3
}

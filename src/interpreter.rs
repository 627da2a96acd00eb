//! Script evaluation used to check produced scripts and record signing operations

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, VerifyOnly};
use tracing::trace;

use crate::address::{hash160, sha256};
use crate::constants::*;
use crate::error::{Result, SignError};
use crate::script::{is_push_only, parse_script, pay_to_pubkey_hash, ScriptBuilder};
use crate::segwit::{witness_program, TxSigHashes, WitnessProgram};
use crate::sighash::{signature_hash, SigHashType};
use crate::sign_ops::{SigHashCache, SignOpCache};
use crate::standard::get_script_class;
use crate::transaction::double_sha256;
use crate::types::*;

/// Verifies signatures for one input and optionally logs each signature opcode.
pub struct SignatureChecker<'a> {
    tx: &'a Transaction,
    input_index: usize,
    amount: Integer,
    sig_hashes: TxSigHashes,
    secp: Secp256k1<VerifyOnly>,
    sign_ops: Option<&'a mut SignOpCache>,
}

impl<'a> SignatureChecker<'a> {
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        amount: Integer,
        sign_ops: Option<&'a mut SignOpCache>,
    ) -> Self {
        SignatureChecker {
            tx,
            input_index,
            amount,
            sig_hashes: TxSigHashes::new(tx),
            secp: Secp256k1::verification_only(),
            sign_ops,
        }
    }

    /// Check `sig` (DER || hash type) against `pubkey` for `script_code`.
    ///
    /// Malformed signatures and keys are simply invalid. Digests are stored
    /// in `cache` so one opcode hashes each hash type at most once.
    fn check_sig(
        &self,
        sig: &[u8],
        pubkey: &[u8],
        script_code: &[u8],
        sig_version: SigVersion,
        cache: &mut SigHashCache,
    ) -> Result<bool> {
        let Some((hash_type_byte, der)) = sig.split_last() else {
            return Ok(false);
        };
        let mut signature = match Signature::from_der(der) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };
        signature.normalize_s();
        let pubkey = match PublicKey::from_slice(pubkey) {
            Ok(pubkey) => pubkey,
            Err(_) => return Ok(false),
        };

        let hash_type = SigHashType::from_sig_byte(*hash_type_byte);
        let digest = cache.get_or_compute(hash_type, || {
            signature_hash(
                script_code,
                &self.sig_hashes,
                hash_type,
                self.tx,
                self.input_index,
                self.amount,
                sig_version,
            )
        })?;
        let message = Message::from_digest_slice(&digest).map_err(|e| SignError::SigHash(e.to_string()))?;

        Ok(self.secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
    }
}

/// True unless `value` is zero or negative zero.
pub fn cast_to_bool(value: &[u8]) -> bool {
    for (i, byte) in value.iter().enumerate() {
        if *byte != 0 {
            return !(i == value.len() - 1 && *byte == 0x80);
        }
    }
    false
}

/// Decode a script number of at most 4 bytes.
pub fn decode_script_num(bytes: &[u8]) -> Option<i64> {
    if bytes.len() > 4 {
        return None;
    }
    let Some((last, _)) = bytes.split_last() else {
        return Some(0);
    };
    let mut value: i64 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        value |= (*byte as i64) << (8 * i);
    }
    if last & 0x80 != 0 {
        value &= !(0x80i64 << (8 * (bytes.len() - 1)));
        value = -value;
    }
    Some(value)
}

fn pop2(stack: &mut Vec<ByteString>) -> Option<(ByteString, ByteString)> {
    if stack.len() < 2 {
        return None;
    }
    let top = stack.pop()?;
    let second = stack.pop()?;
    Some((second, top))
}

/// EvalScript: run `script` against `stack`.
///
/// Returns `Ok(false)` when an opcode fails, and an error when the script
/// cannot be parsed or exceeds a resource limit.
pub fn eval_script(
    script: &[u8],
    stack: &mut Vec<ByteString>,
    checker: &mut SignatureChecker<'_>,
    sig_version: SigVersion,
) -> Result<bool> {
    if script.len() > MAX_SCRIPT_SIZE {
        return Err(SignError::ScriptExecution("Script too large".to_string()));
    }

    let mut op_count = 0;
    for op in parse_script(script)? {
        if let Some(value) = op.pushed_value() {
            if value.len() > MAX_SCRIPT_ELEMENT_SIZE {
                return Err(SignError::ScriptExecution("Push exceeds element size".to_string()));
            }
            stack.push(value);
        } else {
            op_count += 1;
            if op_count > MAX_SCRIPT_OPS {
                return Err(SignError::ScriptExecution("Operation limit exceeded".to_string()));
            }
            if !execute_opcode(op.opcode, stack, script, checker, sig_version)? {
                return Ok(false);
            }
        }

        if stack.len() > MAX_STACK_SIZE {
            return Err(SignError::ScriptExecution("Stack overflow".to_string()));
        }
    }

    Ok(true)
}

/// Execute a single non-push opcode
fn execute_opcode(
    opcode: u8,
    stack: &mut Vec<ByteString>,
    script: &[u8],
    checker: &mut SignatureChecker<'_>,
    sig_version: SigVersion,
) -> Result<bool> {
    match opcode {
        OP_NOP | OP_CODESEPARATOR => Ok(true),

        OP_VERIFY => match stack.pop() {
            Some(item) => Ok(cast_to_bool(&item)),
            None => Ok(false),
        },

        OP_RETURN => Ok(false),

        OP_DROP => Ok(stack.pop().is_some()),

        OP_DUP => match stack.last().cloned() {
            Some(item) => {
                stack.push(item);
                Ok(true)
            }
            None => Ok(false),
        },

        OP_SWAP => match pop2(stack) {
            Some((second, top)) => {
                stack.push(top);
                stack.push(second);
                Ok(true)
            }
            None => Ok(false),
        },

        OP_EQUAL => match pop2(stack) {
            Some((a, b)) => {
                stack.push(if a == b { vec![1] } else { vec![] });
                Ok(true)
            }
            None => Ok(false),
        },

        OP_EQUALVERIFY => match pop2(stack) {
            Some((a, b)) => Ok(a == b),
            None => Ok(false),
        },

        OP_SHA256 => match stack.pop() {
            Some(item) => {
                stack.push(sha256(&item).to_vec());
                Ok(true)
            }
            None => Ok(false),
        },

        OP_HASH160 => match stack.pop() {
            Some(item) => {
                stack.push(hash160(&item).to_vec());
                Ok(true)
            }
            None => Ok(false),
        },

        OP_HASH256 => match stack.pop() {
            Some(item) => {
                stack.push(double_sha256(&item).to_vec());
                Ok(true)
            }
            None => Ok(false),
        },

        OP_CHECKSIG | OP_CHECKSIGVERIFY => {
            let Some((sig, pubkey_bytes)) = pop2(stack) else {
                return Ok(false);
            };

            let mut cache = SigHashCache::new();
            let valid = !sig.is_empty()
                && checker.check_sig(&sig, &pubkey_bytes, script, sig_version, &mut cache)?;

            let keys = PublicKey::from_slice(&pubkey_bytes).into_iter().collect();
            let verify = opcode == OP_CHECKSIGVERIFY;
            if let Some(ops) = checker.sign_ops.as_deref_mut() {
                ops.record_check_sig(verify, cache, keys);
            }
            trace!(valid, verify, "OP_CHECKSIG");

            if verify {
                Ok(valid)
            } else {
                stack.push(if valid { vec![1] } else { vec![] });
                Ok(true)
            }
        }

        OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
            op_checkmultisig(opcode == OP_CHECKMULTISIGVERIFY, stack, script, checker, sig_version)
        }

        _ => Ok(false),
    }
}

fn op_checkmultisig(
    verify: bool,
    stack: &mut Vec<ByteString>,
    script: &[u8],
    checker: &mut SignatureChecker<'_>,
    sig_version: SigVersion,
) -> Result<bool> {
    let Some(n_keys) = stack.pop().and_then(|n| decode_script_num(&n)) else {
        return Ok(false);
    };
    if n_keys < 0 || n_keys as usize > MAX_PUBKEYS_PER_MULTISIG || stack.len() < n_keys as usize {
        return Ok(false);
    }
    // Popped top first, so the last key in the script comes first.
    let mut pubkeys = Vec::with_capacity(n_keys as usize);
    for _ in 0..n_keys {
        let Some(key) = stack.pop() else {
            return Ok(false);
        };
        pubkeys.push(key);
    }

    let Some(n_sigs) = stack.pop().and_then(|n| decode_script_num(&n)) else {
        return Ok(false);
    };
    if n_sigs < 0 || n_sigs > n_keys || stack.len() < n_sigs as usize + 1 {
        return Ok(false);
    }
    let mut sigs = Vec::with_capacity(n_sigs as usize);
    for _ in 0..n_sigs {
        let Some(sig) = stack.pop() else {
            return Ok(false);
        };
        sigs.push(sig);
    }

    // Extra element consumed by the original OP_CHECKMULTISIG implementation
    if stack.pop().is_none() {
        return Ok(false);
    }

    let mut cache = SigHashCache::new();
    let mut success = true;
    let mut sig_index = 0usize;
    let mut key_index = 0usize;
    while sig_index < sigs.len() {
        if pubkeys.len() - key_index < sigs.len() - sig_index {
            success = false;
            break;
        }
        let sig = &sigs[sig_index];
        if !sig.is_empty() && checker.check_sig(sig, &pubkeys[key_index], script, sig_version, &mut cache)? {
            sig_index += 1;
        }
        key_index += 1;
    }

    let keys = pubkeys
        .iter()
        .rev()
        .filter_map(|key| PublicKey::from_slice(key).ok())
        .collect();
    if let Some(ops) = checker.sign_ops.as_deref_mut() {
        ops.record_check_multisig(verify, cache, n_sigs as usize, keys);
    }
    trace!(success, verify, n_sigs, n_keys, "OP_CHECKMULTISIG");

    if verify {
        Ok(success)
    } else {
        stack.push(if success { vec![1] } else { vec![] });
        Ok(true)
    }
}

fn top_is_true(stack: &[ByteString]) -> bool {
    stack.last().map_or(false, |top| cast_to_bool(top))
}

/// Run a version 0 witness program against `witness`.
fn verify_witness_program(
    program: &WitnessProgram,
    witness: &[ByteString],
    checker: &mut SignatureChecker<'_>,
) -> Result<bool> {
    if program.version != 0 {
        // Unknown witness versions are left for future soft forks.
        return Ok(true);
    }

    let (script, mut stack) = match program.program.len() {
        32 => {
            let Some((witness_script, rest)) = witness.split_last() else {
                return Ok(false);
            };
            if sha256(witness_script).as_slice() != program.program.as_slice() {
                return Ok(false);
            }
            (witness_script.clone(), rest.to_vec())
        }
        20 => {
            if witness.len() != 2 {
                return Ok(false);
            }
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&program.program);
            (pay_to_pubkey_hash(&hash)?, witness.to_vec())
        }
        _ => return Ok(false),
    };

    if stack.iter().any(|element| element.len() > MAX_SCRIPT_ELEMENT_SIZE) {
        return Ok(false);
    }
    if !eval_script(&script, &mut stack, checker, SigVersion::WitnessV0)? {
        return Ok(false);
    }
    Ok(stack.len() == 1 && cast_to_bool(&stack[0]))
}

fn verify_script_inner(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[ByteString],
    flags: u32,
    checker: &mut SignatureChecker<'_>,
) -> Result<bool> {
    let sig_ops = parse_script(script_sig)?;
    let mut stack = Vec::new();

    // Execute scriptSig
    if !eval_script(script_sig, &mut stack, checker, SigVersion::Base)? {
        return Ok(false);
    }
    let stack_copy = stack.clone();

    // Execute scriptPubkey
    if !eval_script(script_pubkey, &mut stack, checker, SigVersion::Base)? || !top_is_true(&stack) {
        return Ok(false);
    }

    let mut had_witness = false;
    if flags & SCRIPT_VERIFY_WITNESS != 0 {
        if let Some(program) = witness_program(script_pubkey) {
            had_witness = true;
            if !script_sig.is_empty() || !verify_witness_program(&program, witness, checker)? {
                return Ok(false);
            }
        }
    }

    if flags & SCRIPT_VERIFY_P2SH != 0 && get_script_class(script_pubkey) == ScriptClass::ScriptHash {
        if !is_push_only(&sig_ops) {
            return Ok(false);
        }
        stack = stack_copy;
        let Some(redeem_script) = stack.pop() else {
            return Ok(false);
        };
        if !eval_script(&redeem_script, &mut stack, checker, SigVersion::Base)? || !top_is_true(&stack) {
            return Ok(false);
        }

        if flags & SCRIPT_VERIFY_WITNESS != 0 {
            if let Some(program) = witness_program(&redeem_script) {
                had_witness = true;
                let expected_sig = ScriptBuilder::new().push_data(&redeem_script).into_script()?;
                if script_sig != expected_sig.as_slice() || !verify_witness_program(&program, witness, checker)? {
                    return Ok(false);
                }
            }
        }
    }

    if flags & SCRIPT_VERIFY_WITNESS != 0 && !had_witness && !witness.is_empty() {
        return Ok(false);
    }

    Ok(true)
}

/// VerifyScript: check that `script_sig` and `witness` satisfy `script_pubkey`
/// for input `input_index` of `tx` spending `amount`.
///
/// 1. Execute script_sig, then script_pubkey on the resulting stack
/// 2. If script_pubkey is a witness program, execute it against the witness
/// 3. If script_pubkey is P2SH, execute the redeem script (and a wrapped
///    witness program) on the script_sig stack
#[allow(clippy::too_many_arguments)]
pub fn verify_script(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[ByteString],
    tx: &Transaction,
    input_index: usize,
    amount: Integer,
    flags: u32,
) -> Result<bool> {
    let mut checker = SignatureChecker::new(tx, input_index, amount, None);
    verify_script_inner(script_sig, script_pubkey, witness, flags, &mut checker)
}

/// [`verify_script`] that also appends every executed signature opcode to `sign_ops`.
#[allow(clippy::too_many_arguments)]
pub fn verify_script_with_sign_ops(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[ByteString],
    tx: &Transaction,
    input_index: usize,
    amount: Integer,
    flags: u32,
    sign_ops: &mut SignOpCache,
) -> Result<bool> {
    let mut checker = SignatureChecker::new(tx, input_index, amount, Some(sign_ops));
    verify_script_inner(script_sig, script_pubkey, witness, flags, &mut checker)
}

//! A mainnet P2SH 2-of-3 spend carrying a single signature

mod common;

use script_sign::address::{hash160, Address};
use script_sign::constants::*;
use script_sign::interpreter::{verify_script, verify_script_with_sign_ops};
use script_sign::keystore::NoKeys;
use script_sign::params::MAINNET;
use script_sign::script::*;
use script_sign::sighash::calc_signature_hash;
use script_sign::signer::sign_tx_output;
use script_sign::*;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};

const REDEEM: &str = "522102951f8b7189e7096194cd2461b2d66b561d894ef2d36bd1bb0af86a2fa21fd3fb\
                      2102a3e85daaf647c8985727662b3a037c48db3cbe5236c32526fe4d506d9b55a347\
                      21032eda18a391eb3db1812810836668980469c02b858f5df4bcf15114b06c5b619453ae";

const SIGNATURE: &str = "3046022100eb9bb2e33ba279e8caeacb5101ae1e3bed77a6c88c771eaad4f2a1964d0c6d86\
                         022100ad4c6ff742db9949ff533dcd559b23694dd75a1a3c54b1b8962315065ac5377501";

fn redeem() -> ByteString {
    hex::decode(REDEEM).unwrap()
}

fn signature() -> ByteString {
    hex::decode(SIGNATURE).unwrap()
}

fn redeem_keys() -> Vec<PublicKey> {
    let redeem = redeem();
    [2usize, 36, 70]
        .iter()
        .map(|at| PublicKey::from_slice(&redeem[*at..*at + 33]).unwrap())
        .collect()
}

fn output(value: Integer, script: &str) -> TransactionOutput {
    TransactionOutput { value, script_pubkey: hex::decode(script).unwrap() }
}

fn mainnet_transaction() -> Transaction {
    let mut prev_hash = [0u8; 32];
    prev_hash.copy_from_slice(
        &hex::decode("d129bfacfb07e603b6d5dd160e2795686254684ff2991b9f7775e662c731cb06").unwrap(),
    );
    let script_sig = push_stack_script(&[vec![], signature(), redeem()]).unwrap();

    Transaction {
        version: 1,
        inputs: vec![TransactionInput {
            prevout: OutPoint { hash: prev_hash, index: 1 },
            script_sig,
            sequence: 0xffffffff,
            witness: vec![],
        }],
        outputs: vec![
            output(100_000, "a91487148c0201c58fb7223b14c8b7d81443d37c418f87"),
            output(67_890_000, "a914a18ee4fb6a3e673b1a41f0710b0dd05ca6483d1987"),
        ],
        lock_time: 0,
    }
}

fn pk_script() -> ByteString {
    pay_to_script_hash(&hash160(&redeem())).unwrap()
}

#[test]
fn test_embedded_signature_matches_second_key() {
    let tx = mainnet_transaction();
    let digest = calc_signature_hash(&redeem(), SigHashType::ALL, &tx, 0).unwrap();
    let message = Message::from_digest_slice(&digest).unwrap();

    let sig = signature();
    assert_eq!(sig.last(), Some(&0x01));
    let mut parsed = Signature::from_der(&sig[..sig.len() - 1]).unwrap();
    parsed.normalize_s();

    let secp = Secp256k1::verification_only();
    let keys = redeem_keys();
    assert!(secp.verify_ecdsa(&message, &parsed, &keys[0]).is_err());
    assert!(secp.verify_ecdsa(&message, &parsed, &keys[1]).is_ok());
    assert!(secp.verify_ecdsa(&message, &parsed, &keys[2]).is_err());
}

#[test]
fn test_redeem_script_hash_matches() {
    let tx = mainnet_transaction();
    let script_sig = &tx.inputs[0].script_sig;
    assert_eq!(hex::encode(pk_script()), "a914fcaad2a63424a6f7cc35649ace561cce3b6b6d7587");

    // Without P2SH evaluation only the script hash is checked.
    assert!(verify_script(script_sig, &pk_script(), &[], &tx, 0, 0, 0).unwrap());
    // One signature does not satisfy the 2-of-3 redeem script.
    assert!(!verify_script(script_sig, &pk_script(), &[], &tx, 0, 0, STANDARD_VERIFY_FLAGS).unwrap());
}

#[test]
fn test_partial_signature_survives_merge() {
    let tx = mainnet_transaction();
    let redeem = redeem();
    let sdb = common::scripts(&[(Address::from_script(&redeem), redeem.clone())]);

    let merged = sign_tx_output(
        &MAINNET, &tx, 0, &pk_script(), SigHashType::ALL, &NoKeys, &sdb, &tx.inputs[0].script_sig,
    )
    .unwrap();

    // Bound to the second key, so the third slot stays a placeholder.
    assert_eq!(pushed_data(&merged).unwrap(), vec![vec![], signature(), vec![], redeem]);
}

#[test]
fn test_multisig_sign_op_logged() {
    let tx = mainnet_transaction();
    // Signature on top of the stack so it is checked against the keys.
    let script_sig = push_stack_script(&[vec![], vec![], signature(), redeem()]).unwrap();

    let mut ops = SignOpCache::new();
    let ok =
        verify_script_with_sign_ops(&script_sig, &pk_script(), &[], &tx, 0, 0, STANDARD_VERIFY_FLAGS, &mut ops)
            .unwrap();
    assert!(!ok);

    assert_eq!(ops.len(), 1);
    let op = ops.op_at(0).unwrap();
    assert!(op.is_check_multisig());
    assert!(!op.is_verify());
    assert_eq!(op.opcode(), OP_CHECKMULTISIG);
    assert_eq!(op.required_sigs(), 2);
    assert_eq!(op.keys(), redeem_keys().as_slice());

    let expected = calc_signature_hash(&redeem(), SigHashType::ALL, &tx, 0).unwrap();
    assert_eq!(op.sig_hash(SigHashType::ALL), Some(&expected));
}

//! Property tests for multisig signature merging

mod common;

use common::*;
use proptest::prelude::*;
use script_sign::keystore::NoScripts;
use script_sign::params::MAINNET;
use script_sign::script::{multisig_script, pushed_data};
use script_sign::signer::sign_tx_output;
use script_sign::*;

const SEEDS: [u8; 3] = [1, 2, 3];

fn pk_script() -> ByteString {
    multisig_script(&[compressed(1), compressed(2), compressed(3)], 2).unwrap()
}

fn seeds_for(mask: u8) -> Vec<u8> {
    SEEDS
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, seed)| *seed)
        .collect()
}

fn round(tx: &Transaction, pk_script: &[u8], mask: u8, previous: &[u8]) -> ByteString {
    let keys = TestKeys::with(&seeds_for(mask));
    sign_tx_output(&MAINNET, tx, 0, pk_script, SigHashType::ALL, &keys.map, &NoScripts, previous).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn merge_order_does_not_matter(a in 1u8..8, b in 1u8..8) {
        let tx = create_test_transaction();
        let pk_script = pk_script();

        let ab = round(&tx, &pk_script, b, &round(&tx, &pk_script, a, &[]));
        let ba = round(&tx, &pk_script, a, &round(&tx, &pk_script, b, &[]));

        prop_assert_eq!(&ab, &ba);
        prop_assert_eq!(pushed_data(&ab).unwrap().len(), 3);
        prop_assert_eq!(verifies(&tx, &pk_script, 0, &ab, &[]), (a | b).count_ones() >= 2);
    }

    #[test]
    fn merge_with_self_is_stable(a in 1u8..8) {
        let tx = create_test_transaction();
        let pk_script = pk_script();

        let once = round(&tx, &pk_script, a, &[]);
        let twice = round(&tx, &pk_script, a, &once);

        prop_assert_eq!(once, twice);
    }
}

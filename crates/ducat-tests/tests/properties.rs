//! Property-based invariants: value conservation, fork-choice maximality,
//! difficulty predicate, and transfer tamper-resistance.

use proptest::prelude::*;

use ducat_consensus::engine::ChainController;
use ducat_core::constants::COINBASE_REWARD;
use ducat_core::genesis;
use ducat_core::hashing;
use ducat_core::types::{Block, Transaction};
use ducat_core::validation;
use ducat_tests::helpers::*;
use ducat_wallet::build_transfer;

fn controller() -> ChainController {
    ChainController::with_clock(TEST_DIFFICULTY, || u64::MAX / 2)
}

proptest! {
    // Only coinbases create value, so for any mined history the UTXO set
    // sums to exactly one reward per canonical block.
    #[test]
    fn supply_equals_reward_times_height(miners in prop::collection::vec(any::<u8>(), 1..6)) {
        let mut ctl = controller();
        let mut parent: Block = genesis::genesis_block().clone();

        for seed in &miners {
            let block = mined_child(&parent, &key(*seed).address());
            ctl.ingest(block.clone());
            parent = block;
        }

        let height = ctl.height();
        prop_assert_eq!(height, miners.len() as u64);
        prop_assert_eq!(ctl.utxos().total_value(), COINBASE_REWARD * height);
        // At fixed difficulty the tip's weight equals its height.
        prop_assert_eq!(ctl.cumulative_difficulty(), u128::from(height));
    }

    // Transfers conserve value: a mined-in transfer never changes the
    // total, regardless of the split.
    #[test]
    fn transfers_conserve_supply(send in 1u64..=COINBASE_REWARD) {
        let alice = key(1);
        let bob = key(2);
        let mut ctl = controller();

        let b1 = mined_child(genesis::genesis_block(), &alice.address());
        ctl.ingest(b1.clone());

        let tx = build_transfer(
            &ctl.utxos().owned_by(&alice.address()),
            &alice,
            &bob.address(),
            send,
        ).unwrap();
        let b2 = solve_child(
            &b1,
            vec![Transaction::coinbase(&key(3).address(), 2), tx],
        );
        ctl.ingest(b2);

        prop_assert_eq!(ctl.height(), 2);
        prop_assert_eq!(ctl.utxos().total_value(), 2 * COINBASE_REWARD);
        prop_assert_eq!(ctl.utxos().balance(&bob.address()), send);
        prop_assert_eq!(
            ctl.utxos().balance(&alice.address()),
            COINBASE_REWARD - send,
        );
    }

    // The difficulty predicate is exactly "first d hex digits are zero".
    #[test]
    fn difficulty_predicate_counts_zeros(zeros in 0usize..=8, difficulty in 0u32..=10) {
        let hash = format!("{}{}", "0".repeat(zeros), "f".repeat(64 - zeros));
        let expected = difficulty as usize <= zeros;
        prop_assert_eq!(hashing::meets_difficulty(&hash, difficulty), expected);
    }

    // A wallet-signed transfer is accepted as-is, and any field tamper
    // (amount, recipient, input index, signature) is rejected.
    #[test]
    fn transfer_tamper_is_rejected(send in 1u64..COINBASE_REWARD, field in 0usize..4) {
        let alice = key(1);
        let bob = key(2);

        let cb = Transaction::coinbase(&alice.address(), 1);
        let set = ducat_core::utxo::UtxoSet::new().apply_block(&[cb], 1).unwrap();

        let tx = build_transfer(
            &set.owned_by(&alice.address()),
            &alice,
            &bob.address(),
            send,
        ).unwrap();
        prop_assert!(validation::validate_transaction(&tx, &set).is_ok());

        let mut tampered = tx.clone();
        match field {
            0 => tampered.outs[0].amount += 1,
            1 => tampered.outs[0].address = key(9).address(),
            2 => tampered.ins[0].prev_out_index += 1,
            _ => tampered.ins[0].signature = "00".repeat(64),
        }
        prop_assert!(validation::validate_transaction(&tampered, &set).is_err());
    }
}

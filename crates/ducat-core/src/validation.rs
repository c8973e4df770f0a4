//! Transaction validation against a UTXO snapshot.
//!
//! [`validate_transaction`] performs the full contextual check for a
//! value transfer: structure, id integrity, input existence and
//! ownership, signatures, and exact value conservation (Ducat has no
//! fees, so inputs and outputs must balance to the unit).
//!
//! [`validate_coinbase`] checks the minting transaction of a block
//! against its height; reward amounts are fixed by
//! [`COINBASE_REWARD`](crate::constants::COINBASE_REWARD).

use std::collections::HashSet;

use crate::constants::COINBASE_REWARD;
use crate::crypto;
use crate::error::TransactionError;
use crate::types::Transaction;
use crate::utxo::{Outpoint, UtxoSet};

/// Validate a value-transfer transaction against the given UTXO set.
pub fn validate_transaction(
    tx: &Transaction,
    utxos: &UtxoSet,
) -> Result<(), TransactionError> {
    if tx.ins.is_empty() || tx.outs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    let computed = tx.compute_id();
    if computed != tx.id {
        return Err(TransactionError::IdMismatch {
            declared: tx.id.clone(),
            computed,
        });
    }

    let mut seen = HashSet::with_capacity(tx.ins.len());
    let mut input_total: u64 = 0;

    for (index, txin) in tx.ins.iter().enumerate() {
        let outpoint = Outpoint {
            tx_id: txin.prev_tx_id.clone(),
            out_index: txin.prev_out_index,
        };
        if !seen.insert(outpoint.clone()) {
            return Err(TransactionError::DuplicateInput(outpoint.to_string()));
        }

        let utxo = utxos
            .get(&outpoint)
            .ok_or_else(|| TransactionError::UnknownUtxo(outpoint.to_string()))?;

        if crypto::address_from_pem(&txin.public_key) != utxo.address {
            return Err(TransactionError::OwnerMismatch { index });
        }

        crypto::verify_input_signature(&txin.public_key, &tx.id, &txin.signature)
            .map_err(|_| TransactionError::InvalidSignature { index })?;

        input_total = input_total
            .checked_add(utxo.amount)
            .ok_or(TransactionError::ValueOverflow)?;
    }

    let output_total = tx.total_output().ok_or(TransactionError::ValueOverflow)?;

    if input_total != output_total {
        return Err(TransactionError::ValueMismatch {
            inputs: input_total,
            outputs: output_total,
        });
    }

    Ok(())
}

/// Validate the coinbase of a block at `height`.
pub fn validate_coinbase(tx: &Transaction, height: u64) -> Result<(), TransactionError> {
    if tx.ins.len() != 1 {
        return Err(TransactionError::InvalidCoinbase(
            "must have exactly one input".into(),
        ));
    }
    let txin = &tx.ins[0];
    if !txin.is_coinbase() {
        return Err(TransactionError::InvalidCoinbase(
            "input must be synthetic".into(),
        ));
    }
    if txin.prev_out_index != height {
        return Err(TransactionError::InvalidCoinbase(format!(
            "input index {} does not encode height {height}",
            txin.prev_out_index,
        )));
    }
    if tx.outs.len() != 1 {
        return Err(TransactionError::InvalidCoinbase(
            "must have exactly one output".into(),
        ));
    }
    if tx.outs[0].amount != COINBASE_REWARD {
        return Err(TransactionError::InvalidCoinbase(format!(
            "reward {} != {COINBASE_REWARD}",
            tx.outs[0].amount,
        )));
    }
    let computed = tx.compute_id();
    if computed != tx.id {
        return Err(TransactionError::IdMismatch {
            declared: tx.id.clone(),
            computed,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TxIn, TxOut};
    use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
    use ed25519_dalek::pkcs8::spki::EncodePublicKey;
    use ed25519_dalek::{Signer, SigningKey};

    struct TestKey {
        sk: SigningKey,
        pem: String,
        address: String,
    }

    fn test_key(seed: u8) -> TestKey {
        let sk = SigningKey::from_bytes(&[seed; 32]);
        let pem = sk
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let address = crypto::address_from_pem(&pem);
        TestKey { sk, pem, address }
    }

    fn sign_id(key: &TestKey, id: &str) -> String {
        hex::encode(key.sk.sign(&hex::decode(id).unwrap()).to_bytes())
    }

    /// A set holding one coinbase UTXO owned by `key`, plus its outpoint.
    fn funded_set(key: &TestKey) -> (UtxoSet, Outpoint) {
        let cb = Transaction::coinbase(&key.address, 1);
        let set = UtxoSet::new()
            .apply_block(std::slice::from_ref(&cb), 1)
            .unwrap();
        (set, Outpoint { tx_id: cb.id, out_index: 0 })
    }

    /// Build and sign a transfer of the funded UTXO.
    fn signed_transfer(
        key: &TestKey,
        source: &Outpoint,
        outs: Vec<(String, u64)>,
    ) -> Transaction {
        let mut tx = Transaction::assemble(
            vec![TxIn {
                prev_tx_id: source.tx_id.clone(),
                prev_out_index: source.out_index,
                signature: String::new(),
                public_key: String::new(),
            }],
            outs.into_iter()
                .map(|(address, amount)| TxOut { address, amount })
                .collect(),
        );
        let sig = sign_id(key, &tx.id);
        tx.ins[0].signature = sig;
        tx.ins[0].public_key = key.pem.clone();
        tx
    }

    #[test]
    fn valid_transfer_accepted() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let tx = signed_transfer(
            &alice,
            &source,
            vec![(bob.address.clone(), 30), (alice.address.clone(), 70)],
        );
        assert!(validate_transaction(&tx, &set).is_ok());
    }

    #[test]
    fn empty_outs_rejected() {
        let alice = test_key(1);
        let (set, _) = funded_set(&alice);
        let tx = Transaction::assemble(
            vec![TxIn {
                prev_tx_id: "aa".repeat(32),
                prev_out_index: 0,
                signature: String::new(),
                public_key: String::new(),
            }],
            vec![],
        );
        assert_eq!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::EmptyInputsOrOutputs,
        );
    }

    #[test]
    fn forged_id_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let mut tx = signed_transfer(&alice, &source, vec![(bob.address.clone(), 100)]);
        tx.id = "0".repeat(64);
        assert!(matches!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::IdMismatch { .. },
        ));
    }

    #[test]
    fn tampered_amount_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let mut tx = signed_transfer(&alice, &source, vec![(bob.address.clone(), 100)]);
        // Changing the amount invalidates the declared id first.
        tx.outs[0].amount = 90;
        assert!(matches!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::IdMismatch { .. },
        ));
    }

    #[test]
    fn unknown_utxo_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let set = UtxoSet::new();
        let tx = signed_transfer(
            &alice,
            &Outpoint { tx_id: "ff".repeat(32), out_index: 0 },
            vec![(bob.address.clone(), 100)],
        );
        assert!(matches!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::UnknownUtxo(_),
        ));
    }

    #[test]
    fn wrong_owner_key_rejected() {
        let alice = test_key(1);
        let mallory = test_key(3);
        let (set, source) = funded_set(&alice);
        // Mallory signs with her own key for Alice's UTXO.
        let tx = signed_transfer(&mallory, &source, vec![(mallory.address.clone(), 100)]);
        assert_eq!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::OwnerMismatch { index: 0 },
        );
    }

    #[test]
    fn bad_signature_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let mut tx = signed_transfer(&alice, &source, vec![(bob.address.clone(), 100)]);
        tx.ins[0].signature = "00".repeat(64);
        assert_eq!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::InvalidSignature { index: 0 },
        );
    }

    #[test]
    fn value_mismatch_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let tx = signed_transfer(&alice, &source, vec![(bob.address.clone(), 99)]);
        assert_eq!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::ValueMismatch { inputs: 100, outputs: 99 },
        );
    }

    #[test]
    fn duplicate_input_rejected() {
        let alice = test_key(1);
        let bob = test_key(2);
        let (set, source) = funded_set(&alice);
        let mut tx = Transaction::assemble(
            vec![
                TxIn {
                    prev_tx_id: source.tx_id.clone(),
                    prev_out_index: source.out_index,
                    signature: String::new(),
                    public_key: String::new(),
                },
                TxIn {
                    prev_tx_id: source.tx_id.clone(),
                    prev_out_index: source.out_index,
                    signature: String::new(),
                    public_key: String::new(),
                },
            ],
            vec![TxOut { address: bob.address.clone(), amount: 200 }],
        );
        let sig = sign_id(&alice, &tx.id);
        for txin in &mut tx.ins {
            txin.signature = sig.clone();
            txin.public_key = alice.pem.clone();
        }
        assert!(matches!(
            validate_transaction(&tx, &set).unwrap_err(),
            TransactionError::DuplicateInput(_),
        ));
    }

    // --- Coinbase ---

    #[test]
    fn coinbase_valid() {
        let alice = test_key(1);
        let cb = Transaction::coinbase(&alice.address, 5);
        assert!(validate_coinbase(&cb, 5).is_ok());
    }

    #[test]
    fn coinbase_wrong_height_rejected() {
        let alice = test_key(1);
        let cb = Transaction::coinbase(&alice.address, 5);
        assert!(validate_coinbase(&cb, 6).is_err());
    }

    #[test]
    fn coinbase_wrong_reward_rejected() {
        let alice = test_key(1);
        let mut cb = Transaction::coinbase(&alice.address, 5);
        cb.outs[0].amount = COINBASE_REWARD + 1;
        cb.id = cb.compute_id();
        assert!(matches!(
            validate_coinbase(&cb, 5).unwrap_err(),
            TransactionError::InvalidCoinbase(_),
        ));
    }

    #[test]
    fn coinbase_extra_output_rejected() {
        let alice = test_key(1);
        let mut cb = Transaction::coinbase(&alice.address, 5);
        cb.outs.push(TxOut { address: alice.address.clone(), amount: 1 });
        cb.id = cb.compute_id();
        assert!(matches!(
            validate_coinbase(&cb, 5).unwrap_err(),
            TransactionError::InvalidCoinbase(_),
        ));
    }

    #[test]
    fn coinbase_with_real_input_rejected() {
        let alice = test_key(1);
        let mut cb = Transaction::coinbase(&alice.address, 5);
        cb.ins[0].prev_tx_id = "aa".repeat(32);
        cb.id = cb.compute_id();
        assert!(matches!(
            validate_coinbase(&cb, 5).unwrap_err(),
            TransactionError::InvalidCoinbase(_),
        ));
    }

    #[test]
    fn coinbase_stale_id_rejected() {
        let alice = test_key(1);
        let mut cb = Transaction::coinbase(&alice.address, 5);
        cb.outs[0].address = test_key(2).address;
        assert!(matches!(
            validate_coinbase(&cb, 5).unwrap_err(),
            TransactionError::IdMismatch { .. },
        ));
    }
}

//! Deterministic hashing for transaction ids and block headers.
//!
//! Everything hashes to lowercase hex SHA-256. Ids and header hashes are
//! computed over *textual* payloads: numbers are rendered in decimal and
//! the block body is its JSON serialization, so the wire representation
//! is also the hashing preimage.

use sha2::{Digest, Sha256};

use crate::types::{BlockData, TxIn, TxOut};

/// SHA-256 of arbitrary bytes as 64 lowercase hex characters.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compute a transaction id from its inputs and outputs.
///
/// The preimage is the concatenation of `prevTxId || prevOutIndex` for
/// every input followed by `address || amount` for every output, in
/// order. Signatures and public keys are excluded so the id can be
/// signed before the inputs are populated.
pub fn transaction_id(ins: &[TxIn], outs: &[TxOut]) -> String {
    let mut payload = String::new();
    for txin in ins {
        payload.push_str(&txin.prev_tx_id);
        payload.push_str(&txin.prev_out_index.to_string());
    }
    for txout in outs {
        payload.push_str(&txout.address);
        payload.push_str(&txout.amount.to_string());
    }
    sha256_hex(payload.as_bytes())
}

/// Build the header preimage from its parts.
///
/// `data_json` must be the JSON serialization of the block's [`BlockData`].
/// Exposed separately so the mining loop can serialize the body once and
/// re-hash only the changing nonce.
pub fn block_payload(
    height: u64,
    timestamp: u64,
    prev_hash: &str,
    data_json: &str,
    nonce: u64,
    difficulty: u32,
) -> String {
    format!("{height}{timestamp}{prev_hash}{data_json}{nonce}{difficulty}")
}

/// Compute a block header hash.
pub fn block_hash(
    height: u64,
    timestamp: u64,
    prev_hash: &str,
    data: &BlockData,
    nonce: u64,
    difficulty: u32,
) -> String {
    let data_json = serde_json::to_string(data)
        .expect("block data serializes to JSON");
    sha256_hex(block_payload(height, timestamp, prev_hash, &data_json, nonce, difficulty).as_bytes())
}

/// Proof-of-work predicate: the first `difficulty` hex digits are zero.
///
/// Difficulty 0 accepts any hash; anything above 64 is unsatisfiable for
/// a 64-digit hash and always fails.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    if difficulty > crate::constants::MAX_DIFFICULTY {
        return false;
    }
    hash.chars().take(difficulty as usize).all(|c| c == '0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ins() -> Vec<TxIn> {
        vec![TxIn {
            prev_tx_id: "aa".repeat(32),
            prev_out_index: 0,
            signature: String::new(),
            public_key: String::new(),
        }]
    }

    fn sample_outs() -> Vec<TxOut> {
        vec![TxOut { address: "bb".repeat(32), amount: 100 }]
    }

    #[test]
    fn sha256_hex_shape() {
        let h = sha256_hex(b"ducat");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn transaction_id_deterministic() {
        assert_eq!(
            transaction_id(&sample_ins(), &sample_outs()),
            transaction_id(&sample_ins(), &sample_outs()),
        );
    }

    #[test]
    fn transaction_id_ignores_signatures() {
        let mut signed = sample_ins();
        signed[0].signature = "cc".repeat(64);
        signed[0].public_key = "-----BEGIN PUBLIC KEY-----".into();
        assert_eq!(
            transaction_id(&sample_ins(), &sample_outs()),
            transaction_id(&signed, &sample_outs()),
        );
    }

    #[test]
    fn transaction_id_changes_with_amount() {
        let mut outs = sample_outs();
        outs[0].amount = 99;
        assert_ne!(
            transaction_id(&sample_ins(), &sample_outs()),
            transaction_id(&sample_ins(), &outs),
        );
    }

    #[test]
    fn transaction_id_changes_with_index() {
        let mut ins = sample_ins();
        ins[0].prev_out_index = 1;
        assert_ne!(
            transaction_id(&sample_ins(), &sample_outs()),
            transaction_id(&ins, &sample_outs()),
        );
    }

    #[test]
    fn block_hash_changes_with_nonce() {
        let data = BlockData { miner_tag: "node".into(), txs: vec![] };
        let a = block_hash(1, 1_000, &"0".repeat(64), &data, 0, 1);
        let b = block_hash(1, 1_000, &"0".repeat(64), &data, 1, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn block_hash_matches_manual_payload() {
        let data = BlockData { miner_tag: String::new(), txs: vec![] };
        let data_json = serde_json::to_string(&data).unwrap();
        let manual = sha256_hex(
            block_payload(2, 5, &"1".repeat(64), &data_json, 7, 3).as_bytes(),
        );
        assert_eq!(block_hash(2, 5, &"1".repeat(64), &data, 7, 3), manual);
    }

    #[test]
    fn difficulty_zero_accepts_anything() {
        assert!(meets_difficulty(&"f".repeat(64), 0));
    }

    #[test]
    fn difficulty_counts_leading_zeros() {
        let hash = format!("000{}", "a".repeat(61));
        assert!(meets_difficulty(&hash, 3));
        assert!(!meets_difficulty(&hash, 4));
    }

    #[test]
    fn difficulty_above_width_never_met() {
        assert!(!meets_difficulty(&"0".repeat(64), 65));
    }

    #[test]
    fn difficulty_full_width_met_by_all_zeros() {
        assert!(meets_difficulty(&"0".repeat(64), 64));
    }
}

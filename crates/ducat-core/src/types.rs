//! Core protocol types: transactions, blocks, and their hashing glue.
//!
//! These structs double as the wire format — every field serializes to
//! the camelCase JSON the HTTP boundary exchanges, and the id/hash
//! preimages are built from the same representations.

use serde::{Deserialize, Serialize};

use crate::constants::COINBASE_REWARD;
use crate::hashing;

/// A transaction input, spending a previous output.
///
/// Coinbase inputs are synthetic: empty `prevTxId`, `prevOutIndex` set
/// to the block height (which makes every coinbase id unique), and
/// empty signature and public key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxIn {
    /// Id of the transaction containing the referenced output.
    pub prev_tx_id: String,
    /// Index of the output within that transaction.
    pub prev_out_index: u64,
    /// Hex-encoded Ed25519 signature over the hex-decoded transaction id.
    pub signature: String,
    /// PEM-encoded Ed25519 public key of the output's owner.
    pub public_key: String,
}

impl TxIn {
    /// Whether this is the synthetic coinbase input.
    pub fn is_coinbase(&self) -> bool {
        self.prev_tx_id.is_empty() && self.signature.is_empty() && self.public_key.is_empty()
    }
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TxOut {
    /// Hex SHA-256 of the recipient's PEM-encoded public key.
    pub address: String,
    /// Amount in ducats.
    pub amount: u64,
}

/// A transaction transferring value between addresses.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Hex SHA-256 over the inputs' outpoints and the outputs.
    pub id: String,
    pub ins: Vec<TxIn>,
    pub outs: Vec<TxOut>,
}

impl Transaction {
    /// Build a transaction from inputs and outputs, computing the id.
    pub fn assemble(ins: Vec<TxIn>, outs: Vec<TxOut>) -> Self {
        let id = hashing::transaction_id(&ins, &outs);
        Self { id, ins, outs }
    }

    /// Build the coinbase for a block at `height`, minting the reward
    /// to `address`.
    pub fn coinbase(address: &str, height: u64) -> Self {
        Self::assemble(
            vec![TxIn {
                prev_tx_id: String::new(),
                prev_out_index: height,
                signature: String::new(),
                public_key: String::new(),
            }],
            vec![TxOut { address: address.to_string(), amount: COINBASE_REWARD }],
        )
    }

    /// Recompute the id from the current inputs and outputs.
    pub fn compute_id(&self) -> String {
        hashing::transaction_id(&self.ins, &self.outs)
    }

    /// Whether this is a coinbase (single synthetic input).
    pub fn is_coinbase(&self) -> bool {
        self.ins.len() == 1 && self.ins[0].is_coinbase()
    }

    /// Sum of all output amounts. `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.amount))
    }
}

/// The mined body of a block: an operator tag plus the transactions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    /// Free-form tag identifying the miner (shown in explorers/logs).
    pub miner_tag: String,
    /// Ordered transactions; first must be the coinbase for non-genesis
    /// blocks.
    pub txs: Vec<Transaction>,
}

/// A complete block: header fields, body, and the declared header hash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub height: u64,
    /// Unix milliseconds.
    pub timestamp: u64,
    pub prev_hash: String,
    pub data: BlockData,
    pub nonce: u64,
    /// Required count of leading zero hex digits in `hash`.
    pub difficulty: u32,
    /// Hex SHA-256 of the header preimage. Must equal [`Block::compute_hash`].
    pub hash: String,
}

impl Block {
    /// Recompute the header hash from the block's fields.
    pub fn compute_hash(&self) -> String {
        hashing::block_hash(
            self.height,
            self.timestamp,
            &self.prev_hash,
            &self.data,
            self.nonce,
            self.difficulty,
        )
    }

    /// The coinbase transaction, if the body is non-empty.
    pub fn coinbase(&self) -> Option<&Transaction> {
        self.data.txs.first()
    }
}

//! The unspent-output set and the block application rules.
//!
//! [`UtxoSet::apply_block`] is functional: it validates a block's
//! transactions against the pre-block snapshot and returns a fresh set,
//! leaving the input untouched. Chain replay and fork evaluation build
//! on this — a candidate chain is applied block by block starting from
//! an empty set, and the canonical set is only ever swapped for a fully
//! replayed one.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BlockError;
use crate::types::Transaction;
use crate::validation;

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outpoint {
    pub tx_id: String,
    pub out_index: u64,
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_id, self.out_index)
    }
}

/// An unspent transaction output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub out_index: u64,
    pub address: String,
    pub amount: u64,
}

impl Utxo {
    /// The outpoint identifying this output.
    pub fn outpoint(&self) -> Outpoint {
        Outpoint { tx_id: self.tx_id.clone(), out_index: self.out_index }
    }
}

/// The set of unspent outputs, keyed by `(txId, outIndex)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoSet {
    entries: HashMap<Outpoint, Utxo>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, outpoint: &Outpoint) -> Option<&Utxo> {
        self.entries.get(outpoint)
    }

    pub fn contains(&self, outpoint: &Outpoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Utxo> {
        self.entries.values()
    }

    /// All outputs owned by `address`.
    pub fn owned_by(&self, address: &str) -> Vec<Utxo> {
        self.entries
            .values()
            .filter(|u| u.address == address)
            .cloned()
            .collect()
    }

    /// Sum of amounts owned by `address`.
    pub fn balance(&self, address: &str) -> u64 {
        self.entries
            .values()
            .filter(|u| u.address == address)
            .map(|u| u.amount)
            .sum()
    }

    /// Sum of all amounts in the set.
    pub fn total_value(&self) -> u64 {
        self.entries.values().map(|u| u.amount).sum()
    }

    /// Apply a block's transactions, producing the successor set.
    ///
    /// Rules:
    /// - Height 0 carries no transactions and leaves the set unchanged.
    /// - The first transaction must be a valid coinbase for `height`.
    /// - No outpoint may be referenced twice across the whole block.
    /// - Every other transaction must validate against *this* set — a
    ///   transaction cannot spend an output created earlier in the same
    ///   block.
    pub fn apply_block(
        &self,
        txs: &[Transaction],
        height: u64,
    ) -> Result<UtxoSet, BlockError> {
        if height == 0 {
            if !txs.is_empty() {
                return Err(BlockError::GenesisNotEmpty);
            }
            return Ok(self.clone());
        }

        let coinbase = txs.first().ok_or(BlockError::MissingCoinbase)?;
        validation::validate_coinbase(coinbase, height)
            .map_err(|source| BlockError::Transaction { index: 0, source })?;

        // One spend per outpoint across the entire block.
        let mut referenced = HashSet::new();
        for tx in txs {
            for txin in &tx.ins {
                if txin.is_coinbase() {
                    continue;
                }
                let outpoint = Outpoint {
                    tx_id: txin.prev_tx_id.clone(),
                    out_index: txin.prev_out_index,
                };
                if !referenced.insert(outpoint.clone()) {
                    return Err(BlockError::DoubleSpend(outpoint.to_string()));
                }
            }
        }

        for (index, tx) in txs.iter().enumerate().skip(1) {
            validation::validate_transaction(tx, self)
                .map_err(|source| BlockError::Transaction { index, source })?;
        }

        let mut next = self.clone();
        for tx in txs {
            for txin in &tx.ins {
                if txin.is_coinbase() {
                    continue;
                }
                next.entries.remove(&Outpoint {
                    tx_id: txin.prev_tx_id.clone(),
                    out_index: txin.prev_out_index,
                });
            }
            for (out_index, txout) in tx.outs.iter().enumerate() {
                let utxo = Utxo {
                    tx_id: tx.id.clone(),
                    out_index: out_index as u64,
                    address: txout.address.clone(),
                    amount: txout.amount,
                };
                next.entries.insert(utxo.outpoint(), utxo);
            }
        }
        Ok(next)
    }
}

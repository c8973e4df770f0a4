//! In-memory pool of pending transactions.
//!
//! The pool preserves submission order (mining selection is first-come)
//! and keeps a spent-outpoint index so that no two pending transactions
//! ever consume the same output. Contextual validation against the
//! canonical UTXO set is the caller's job — the node validates before
//! inserting and rebuilds the pool after reorganizations via [`drain`].
//!
//! [`drain`]: Mempool::drain

use std::collections::{HashMap, HashSet};

use crate::error::MempoolError;
use crate::types::Transaction;
use crate::utxo::Outpoint;

/// Insertion-ordered pool of pending transactions.
#[derive(Debug, Default)]
pub struct Mempool {
    /// Pending transactions in submission order.
    entries: Vec<Transaction>,
    /// Ids of pooled transactions.
    ids: HashSet<String>,
    /// Outpoint consumed by a pool transaction → that transaction's id.
    by_outpoint: HashMap<Outpoint, String>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-validated transaction.
    ///
    /// Rejects duplicates by id and any transaction whose inputs overlap
    /// with an already-pooled transaction, so the pool stays assemblable
    /// into a single block without double spends.
    pub fn insert(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        if self.ids.contains(&tx.id) {
            return Err(MempoolError::AlreadyPooled(tx.id.clone()));
        }
        for txin in &tx.ins {
            let outpoint = Outpoint {
                tx_id: txin.prev_tx_id.clone(),
                out_index: txin.prev_out_index,
            };
            if let Some(pooled) = self.by_outpoint.get(&outpoint) {
                return Err(MempoolError::InputConflict {
                    outpoint: outpoint.to_string(),
                    pooled: pooled.clone(),
                });
            }
        }

        for txin in &tx.ins {
            self.by_outpoint.insert(
                Outpoint {
                    tx_id: txin.prev_tx_id.clone(),
                    out_index: txin.prev_out_index,
                },
                tx.id.clone(),
            );
        }
        self.ids.insert(tx.id.clone());
        self.entries.push(tx);
        Ok(())
    }

    /// Remove a transaction by id, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let pos = self.entries.iter().position(|tx| tx.id == id)?;
        let tx = self.entries.remove(pos);
        self.ids.remove(&tx.id);
        for txin in &tx.ins {
            self.by_outpoint.remove(&Outpoint {
                tx_id: txin.prev_tx_id.clone(),
                out_index: txin.prev_out_index,
            });
        }
        Some(tx)
    }

    /// Empty the pool, returning the transactions in submission order.
    ///
    /// Used for post-reorg repair: the node drains the pool, appends the
    /// detached chain's transactions, and re-inserts whatever still
    /// validates.
    pub fn drain(&mut self) -> Vec<Transaction> {
        self.ids.clear();
        self.by_outpoint.clear();
        std::mem::take(&mut self.entries)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Whether any pool transaction consumes the given outpoint.
    pub fn consumes(&self, outpoint: &Outpoint) -> bool {
        self.by_outpoint.contains_key(outpoint)
    }

    /// All outpoints consumed by pooled transactions.
    pub fn consumed_outpoints(&self) -> impl Iterator<Item = &Outpoint> {
        self.by_outpoint.keys()
    }

    /// The first `k` transactions in submission order.
    pub fn select(&self, k: usize) -> Vec<Transaction> {
        self.entries.iter().take(k).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.iter()
    }

    pub fn txids(&self) -> Vec<String> {
        self.entries.iter().map(|tx| tx.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

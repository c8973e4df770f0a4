//! # ducat-consensus — block tree, fork-choice, and proof-of-work.
//!
//! [`ChainController`] owns the block tree, the canonical tip, and the
//! canonical UTXO set, and implements ingest with reorganization and
//! orphan draining. [`miner::mine`] is the nonce-scanning engine run on
//! a worker thread with cooperative cancellation.

pub mod engine;
pub mod miner;
pub mod tree;

pub use engine::{ChainController, Ingest, IngestStatus, SyncOutcome, TipChange};
pub use miner::{mine, MineJob, MineOutcome};

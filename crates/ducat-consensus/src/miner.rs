//! Nonce-scanning proof-of-work engine.
//!
//! [`mine`] runs on a dedicated worker thread and coordinates with the
//! node through exactly two channels: the returned [`MineOutcome`] and a
//! shared cancel word it polls cooperatively. No other state crosses the
//! boundary.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use ducat_core::hashing;
use ducat_core::types::{Block, BlockData, Transaction};

/// Attempts between cancel-flag polls. Single-threaded SHA-256 over
/// these short payloads runs in the millions of hashes per second, so
/// 4096 attempts keeps cancellation latency around a millisecond — far
/// inside the restart debounce window — while keeping the flag off the
/// hot path.
pub const CANCEL_POLL_STRIDE: u64 = 4096;

/// A candidate-block assembly handed to the engine.
#[derive(Clone, Debug)]
pub struct MineJob {
    pub height: u64,
    pub prev_hash: String,
    pub difficulty: u32,
    pub miner_tag: String,
    /// Coinbase first, then the selected pending transactions.
    pub txs: Vec<Transaction>,
    /// Lower bound for the header timestamp (the parent's timestamp).
    pub min_timestamp: u64,
}

/// Terminal state of a mining run.
#[derive(Clone, Debug)]
pub enum MineOutcome {
    Mined(Block),
    Cancelled,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Scan nonces from zero until the header hash meets the difficulty or
/// the cancel word is set.
///
/// The block body is serialized once; each attempt re-hashes only the
/// header preimage. The timestamp is refreshed at every poll stride so a
/// slow job never drifts behind the acceptance window of other nodes.
pub fn mine(job: &MineJob, cancel: &AtomicBool) -> MineOutcome {
    let data = BlockData {
        miner_tag: job.miner_tag.clone(),
        txs: job.txs.clone(),
    };
    let data_json = serde_json::to_string(&data).expect("block data serializes to JSON");

    let mut timestamp = now_ms().max(job.min_timestamp);
    let mut nonce: u64 = 0;

    loop {
        if nonce % CANCEL_POLL_STRIDE == 0 {
            if cancel.load(Ordering::Relaxed) {
                return MineOutcome::Cancelled;
            }
            timestamp = now_ms().max(job.min_timestamp);
        }

        let payload = hashing::block_payload(
            job.height,
            timestamp,
            &job.prev_hash,
            &data_json,
            nonce,
            job.difficulty,
        );
        let hash = hashing::sha256_hex(payload.as_bytes());

        if hashing::meets_difficulty(&hash, job.difficulty) {
            return MineOutcome::Mined(Block {
                height: job.height,
                timestamp,
                prev_hash: job.prev_hash.clone(),
                data,
                nonce,
                difficulty: job.difficulty,
                hash,
            });
        }

        nonce = nonce.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ducat_core::genesis;

    fn job(difficulty: u32) -> MineJob {
        MineJob {
            height: 1,
            prev_hash: genesis::genesis_hash().to_string(),
            difficulty,
            miner_tag: "test-rig".into(),
            txs: vec![Transaction::coinbase(&hex::encode([0xAA; 32]), 1)],
            min_timestamp: 0,
        }
    }

    #[test]
    fn mines_at_trivial_difficulty() {
        let cancel = AtomicBool::new(false);
        let MineOutcome::Mined(block) = mine(&job(0), &cancel) else {
            panic!("expected a mined block");
        };
        assert_eq!(block.height, 1);
        assert_eq!(block.nonce, 0);
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn mined_block_meets_difficulty() {
        let cancel = AtomicBool::new(false);
        let MineOutcome::Mined(block) = mine(&job(1), &cancel) else {
            panic!("expected a mined block");
        };
        assert!(hashing::meets_difficulty(&block.hash, 1));
        assert_eq!(block.hash, block.compute_hash());
        assert_eq!(block.data.txs.len(), 1);
    }

    #[test]
    fn respects_min_timestamp() {
        let cancel = AtomicBool::new(false);
        let mut j = job(0);
        j.min_timestamp = u64::MAX / 2; // far beyond any real clock
        let MineOutcome::Mined(block) = mine(&j, &cancel) else {
            panic!("expected a mined block");
        };
        assert!(block.timestamp >= j.min_timestamp);
    }

    #[test]
    fn pre_set_cancel_returns_immediately() {
        let cancel = AtomicBool::new(true);
        // Unsolvable difficulty: only the cancel path can return.
        assert!(matches!(mine(&job(64), &cancel), MineOutcome::Cancelled));
    }

    #[test]
    fn cancel_from_another_thread_stops_the_scan() {
        let cancel = std::sync::Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let handle = std::thread::spawn(move || mine(&job(64), &flag));
        std::thread::sleep(std::time::Duration::from_millis(20));
        cancel.store(true, Ordering::Relaxed);
        assert!(matches!(handle.join().unwrap(), MineOutcome::Cancelled));
    }
}

//! Chain controller: ingest, fork-choice, reorganization, catch-up.
//!
//! The controller owns the block tree, the canonical tip, and the
//! canonical UTXO set. Candidate branches are evaluated by replaying
//! their transactions from an empty set, and the canonical UTXO set is
//! only ever swapped for a fully replayed one, so a bad block can never
//! leave partial state behind.
//!
//! Fork-choice is strictly-greater cumulative difficulty: an equally
//! heavy branch never displaces the current tip, which keeps the choice
//! stable under message re-delivery.

use std::collections::{HashSet, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use ducat_core::constants::MAX_FUTURE_DRIFT_MS;
use ducat_core::error::{BlockError, ChainError};
use ducat_core::genesis;
use ducat_core::hashing;
use ducat_core::types::Block;
use ducat_core::utxo::UtxoSet;

use crate::tree::BlockTree;

/// Blocks that entered and left the canonical sequence during a tip
/// change. `connected` is ordered oldest-first; a plain extension has
/// one connected block and nothing detached.
#[derive(Clone, Debug, Default)]
pub struct TipChange {
    pub connected: Vec<Block>,
    pub detached: Vec<Block>,
}

impl TipChange {
    fn merge(mut changes: Vec<TipChange>) -> Option<TipChange> {
        if changes.is_empty() {
            return None;
        }
        let mut merged = changes.remove(0);
        for change in changes {
            merged.connected.extend(change.connected);
            merged.detached.extend(change.detached);
        }
        Some(merged)
    }
}

/// Disposition of a single ingested block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngestStatus {
    /// Stored in the tree (canonical or side branch).
    Accepted,
    /// Hash already known; nothing to do.
    AlreadyKnown,
    /// Parent unknown; parked in the orphan index.
    Orphaned { missing_parent: String },
    /// Failed validation; not stored. Terminal for this hash.
    Rejected(BlockError),
}

/// Result of [`ChainController::ingest`], covering the delivered block
/// and any orphans drained behind it.
#[derive(Clone, Debug)]
pub struct Ingest {
    pub status: IngestStatus,
    /// Canonical-sequence delta, present when the tip moved.
    pub tip_change: Option<TipChange>,
}

/// Result of a full-chain replacement attempt.
#[derive(Clone, Debug)]
pub enum SyncOutcome {
    /// The remote chain was heavier and is now canonical.
    Replaced(TipChange),
    /// The local chain is at least as heavy; nothing changed.
    KeptLocal,
}

enum Accept {
    Inserted(String),
    Known,
    Orphaned(String),
    Rejected(BlockError),
}

/// Owns the block tree, canonical tip, and canonical UTXO set.
pub struct ChainController {
    tree: BlockTree,
    utxos: UtxoSet,
    tip: String,
    difficulty: u32,
    clock: Box<dyn Fn() -> u64 + Send + Sync>,
}

impl std::fmt::Debug for ChainController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainController")
            .field("tip", &self.tip)
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}

fn system_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl ChainController {
    /// Controller at genesis with the node's fixed difficulty.
    pub fn new(difficulty: u32) -> Self {
        Self::with_clock(difficulty, system_now_ms)
    }

    /// Controller with an injected clock for timestamp-window tests.
    pub fn with_clock(
        difficulty: u32,
        clock: impl Fn() -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            tree: BlockTree::new(),
            utxos: UtxoSet::new(),
            tip: genesis::genesis_hash().to_string(),
            difficulty,
            clock: Box::new(clock),
        }
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn tip_hash(&self) -> &str {
        &self.tip
    }

    /// The canonical tip block.
    pub fn tip_block(&self) -> &Block {
        self.tree
            .block(&self.tip)
            .expect("canonical tip is always in the tree")
    }

    pub fn height(&self) -> u64 {
        self.tip_block().height
    }

    /// Cumulative difficulty of the canonical tip.
    pub fn cumulative_difficulty(&self) -> u128 {
        self.tree
            .cumulative_difficulty(&self.tip)
            .expect("canonical tip is always in the tree")
    }

    /// The canonical UTXO set (replay of the canonical chain).
    pub fn utxos(&self) -> &UtxoSet {
        &self.utxos
    }

    /// Canonical chain from genesis to tip, oldest first.
    pub fn canonical_chain(&self) -> Vec<Block> {
        self.tree
            .path_to(&self.tip)
            .expect("canonical tip is always in the tree")
            .into_iter()
            .cloned()
            .collect()
    }

    /// Any known block by hash, canonical or not.
    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.tree.block(hash)
    }

    pub fn orphan_count(&self) -> usize {
        self.tree.orphan_count()
    }

    /// Ingest one block, then drain any orphans that were waiting on it
    /// (iteratively — a long parked branch connects in one call).
    pub fn ingest(&mut self, block: Block) -> Ingest {
        let mut changes = Vec::new();
        let first = self.accept(block, &mut changes);

        let status = match first {
            Accept::Inserted(hash) => {
                self.drain_orphans(hash, &mut changes);
                IngestStatus::Accepted
            }
            Accept::Known => IngestStatus::AlreadyKnown,
            Accept::Orphaned(missing_parent) => IngestStatus::Orphaned { missing_parent },
            Accept::Rejected(err) => IngestStatus::Rejected(err),
        };

        Ingest { status, tip_change: TipChange::merge(changes) }
    }

    fn drain_orphans(&mut self, start: String, changes: &mut Vec<TipChange>) {
        let mut queue = VecDeque::from([start]);
        while let Some(parent) = queue.pop_front() {
            for orphan in self.tree.take_orphans(&parent) {
                let hash = orphan.hash.clone();
                match self.accept(orphan, changes) {
                    Accept::Inserted(inserted) => queue.push_back(inserted),
                    Accept::Rejected(err) => {
                        warn!(block = %hash, %err, "dropping invalid orphan");
                    }
                    Accept::Known | Accept::Orphaned(_) => {}
                }
            }
        }
    }

    /// Validate and store a single block, updating the tip if its branch
    /// is strictly heavier.
    fn accept(&mut self, block: Block, changes: &mut Vec<TipChange>) -> Accept {
        if self.tree.contains(&block.hash) {
            return Accept::Known;
        }
        if block.height == 0 {
            return Accept::Rejected(BlockError::UnexpectedGenesis);
        }

        let Some(parent) = self.tree.get(&block.prev_hash) else {
            debug!(block = %block.hash, missing = %block.prev_hash, "parking orphan");
            let missing = block.prev_hash.clone();
            self.tree.add_orphan(block);
            return Accept::Orphaned(missing);
        };
        let parent_block = parent.block.clone();

        if let Err(err) = self.validate_linked(&block, &parent_block) {
            return Accept::Rejected(err);
        }

        // Replay the whole candidate branch from an empty set. The result
        // is only adopted if this branch wins fork-choice.
        let mut branch: Vec<&Block> = match self.tree.path_to(&parent_block.hash) {
            Some(path) => path,
            None => return Accept::Rejected(BlockError::PrevHashMismatch),
        };
        branch.push(&block);
        let replayed = match replay(&branch) {
            Ok(set) => set,
            Err(err) => return Accept::Rejected(err),
        };

        let hash = block.hash.clone();
        let height = block.height;
        let cumulative = self
            .tree
            .insert_child(block)
            .expect("parent existence checked above");

        if cumulative > self.cumulative_difficulty() {
            let change = self.switch_tip(&hash, replayed);
            let reorged = !change.detached.is_empty();
            if reorged {
                info!(
                    tip = %hash,
                    height,
                    detached = change.detached.len(),
                    connected = change.connected.len(),
                    "chain reorganized",
                );
            } else {
                debug!(tip = %hash, height, "chain extended");
            }
            changes.push(change);
        } else {
            debug!(block = %hash, height, "stored on side branch");
        }

        Accept::Inserted(hash)
    }

    /// Header checks of a block against its (present) parent.
    fn validate_linked(&self, block: &Block, parent: &Block) -> Result<(), BlockError> {
        if block.height != parent.height + 1 {
            return Err(BlockError::HeightMismatch {
                expected: parent.height + 1,
                got: block.height,
            });
        }
        if block.difficulty != self.difficulty {
            return Err(BlockError::DifficultyMismatch {
                expected: self.difficulty,
                got: block.difficulty,
            });
        }
        if block.compute_hash() != block.hash {
            return Err(BlockError::HashMismatch);
        }
        if !hashing::meets_difficulty(&block.hash, block.difficulty) {
            return Err(BlockError::PowNotMet(block.difficulty));
        }
        if block.timestamp < parent.timestamp {
            return Err(BlockError::TimestampBeforeParent);
        }
        let horizon = (self.clock)().saturating_add(MAX_FUTURE_DRIFT_MS);
        if block.timestamp > horizon {
            return Err(BlockError::TimestampTooFar {
                ahead_ms: block.timestamp - horizon + MAX_FUTURE_DRIFT_MS,
            });
        }
        Ok(())
    }

    /// Make `new_tip` canonical and adopt its replayed UTXO set.
    fn switch_tip(&mut self, new_tip: &str, replayed: UtxoSet) -> TipChange {
        let old_path = self.canonical_chain();
        let new_path: Vec<Block> = self
            .tree
            .path_to(new_tip)
            .expect("new tip was just inserted")
            .into_iter()
            .cloned()
            .collect();

        let new_hashes: HashSet<&str> = new_path.iter().map(|b| b.hash.as_str()).collect();
        let old_hashes: HashSet<&str> = old_path.iter().map(|b| b.hash.as_str()).collect();

        let detached = old_path
            .iter()
            .filter(|b| !new_hashes.contains(b.hash.as_str()))
            .cloned()
            .collect();
        let connected = new_path
            .iter()
            .filter(|b| !old_hashes.contains(b.hash.as_str()))
            .cloned()
            .collect();

        self.tip = new_tip.to_string();
        self.utxos = replayed;

        TipChange { connected, detached }
    }

    /// Replace local state with a peer's full chain if it is strictly
    /// heavier. Side branches and parked orphans are discarded; the tree
    /// is rebuilt from the received linear chain.
    pub fn replace_chain(&mut self, chain: Vec<Block>) -> Result<SyncOutcome, ChainError> {
        let first = chain.first().ok_or(ChainError::EmptyChain)?;
        if !genesis::is_genesis(first) {
            return Err(ChainError::ForeignGenesis);
        }

        for (index, window) in chain.windows(2).enumerate() {
            let (parent, block) = (&window[0], &window[1]);
            if block.prev_hash != parent.hash {
                return Err(ChainError::InvalidBlock {
                    index: index + 1,
                    source: BlockError::PrevHashMismatch,
                });
            }
            self.validate_linked(block, parent)
                .map_err(|source| ChainError::InvalidBlock { index: index + 1, source })?;
        }

        let mut replayed = UtxoSet::new();
        for (index, block) in chain.iter().enumerate() {
            replayed = replayed
                .apply_block(&block.data.txs, block.height)
                .map_err(|source| ChainError::InvalidBlock { index, source })?;
        }

        let remote: u128 = chain.iter().map(|b| u128::from(b.difficulty)).sum();
        let local = self.cumulative_difficulty();
        if remote <= local {
            debug!(local, remote, "keeping local chain");
            return Ok(SyncOutcome::KeptLocal);
        }

        let old_path = self.canonical_chain();
        let new_hashes: HashSet<&str> = chain.iter().map(|b| b.hash.as_str()).collect();
        let old_hashes: HashSet<&str> = old_path.iter().map(|b| b.hash.as_str()).collect();
        let detached: Vec<Block> = old_path
            .iter()
            .filter(|b| !new_hashes.contains(b.hash.as_str()))
            .cloned()
            .collect();
        let connected: Vec<Block> = chain
            .iter()
            .filter(|b| !old_hashes.contains(b.hash.as_str()))
            .cloned()
            .collect();

        let mut tree = BlockTree::new();
        for block in chain.iter().skip(1) {
            tree.insert_child(block.clone())
                .expect("links validated above");
        }
        let tip = chain.last().expect("chain is non-empty").hash.clone();

        info!(
            tip = %tip,
            height = chain.len() as u64 - 1,
            local,
            remote,
            "adopted heavier remote chain",
        );

        self.tree = tree;
        self.tip = tip;
        self.utxos = replayed;

        Ok(SyncOutcome::Replaced(TipChange { connected, detached }))
    }
}

/// Replay a genesis-rooted branch from an empty UTXO set.
fn replay(branch: &[&Block]) -> Result<UtxoSet, BlockError> {
    let mut set = UtxoSet::new();
    for block in branch {
        set = set.apply_block(&block.data.txs, block.height)?;
    }
    Ok(set)
}

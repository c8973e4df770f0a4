//! The block tree and orphan index.
//!
//! Every validated block is stored keyed by its header hash together
//! with the cumulative difficulty of the branch ending at it. Blocks are
//! never mutated or removed; a branch displaced from the canonical chain
//! stays in the tree and may become canonical again later. Blocks whose
//! parent is unknown wait in the orphan index keyed by the missing
//! parent hash.

use std::collections::HashMap;

use ducat_core::genesis;
use ducat_core::types::Block;

/// A stored block plus branch bookkeeping.
#[derive(Clone, Debug)]
pub struct TreeNode {
    pub block: Block,
    /// Sum of `difficulty` over the branch from genesis to this block.
    pub cumulative_difficulty: u128,
}

/// All known blocks, rooted at the hardcoded genesis.
#[derive(Debug)]
pub struct BlockTree {
    nodes: HashMap<String, TreeNode>,
    /// Missing parent hash → blocks waiting for it.
    orphans: HashMap<String, Vec<Block>>,
}

impl BlockTree {
    /// A tree containing only the genesis block.
    pub fn new() -> Self {
        let genesis = genesis_node();
        let mut nodes = HashMap::new();
        nodes.insert(genesis.block.hash.clone(), genesis);
        Self { nodes, orphans: HashMap::new() }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.nodes.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&TreeNode> {
        self.nodes.get(hash)
    }

    pub fn block(&self, hash: &str) -> Option<&Block> {
        self.nodes.get(hash).map(|n| &n.block)
    }

    pub fn cumulative_difficulty(&self, hash: &str) -> Option<u128> {
        self.nodes.get(hash).map(|n| n.cumulative_difficulty)
    }

    /// Number of blocks in the tree (including genesis).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a validated block whose parent is present.
    ///
    /// Returns the block's cumulative difficulty, or `None` if the
    /// parent is unknown (the caller should have routed such a block to
    /// [`add_orphan`](Self::add_orphan) instead).
    pub fn insert_child(&mut self, block: Block) -> Option<u128> {
        let parent = self.nodes.get(&block.prev_hash)?;
        let cumulative = parent.cumulative_difficulty + u128::from(block.difficulty);
        self.nodes.insert(
            block.hash.clone(),
            TreeNode { block, cumulative_difficulty: cumulative },
        );
        Some(cumulative)
    }

    /// The branch from genesis up to and including `hash`, oldest first.
    pub fn path_to(&self, hash: &str) -> Option<Vec<&Block>> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(hash)?;
        loop {
            path.push(&cursor.block);
            if cursor.block.height == 0 {
                break;
            }
            cursor = self.nodes.get(&cursor.block.prev_hash)?;
        }
        path.reverse();
        Some(path)
    }

    /// Park a block until its parent arrives. Duplicate orphans (same
    /// hash) are ignored.
    pub fn add_orphan(&mut self, block: Block) {
        let waiting = self.orphans.entry(block.prev_hash.clone()).or_default();
        if waiting.iter().any(|b| b.hash == block.hash) {
            return;
        }
        waiting.push(block);
    }

    /// Remove and return every orphan waiting on `parent_hash`.
    pub fn take_orphans(&mut self, parent_hash: &str) -> Vec<Block> {
        self.orphans.remove(parent_hash).unwrap_or_default()
    }

    /// Total number of parked orphan blocks.
    pub fn orphan_count(&self) -> usize {
        self.orphans.values().map(Vec::len).sum()
    }

    /// Parent hashes currently being waited on.
    pub fn missing_parents(&self) -> Vec<String> {
        self.orphans.keys().cloned().collect()
    }
}

impl Default for BlockTree {
    fn default() -> Self {
        Self::new()
    }
}

fn genesis_node() -> TreeNode {
    TreeNode {
        block: genesis::genesis_block().clone(),
        cumulative_difficulty: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ducat_core::types::BlockData;

    /// Unvalidated child block for tree-only tests (difficulty 1, fake
    /// hash derived from the nonce).
    fn child_of(parent: &Block, nonce: u64) -> Block {
        let mut block = Block {
            height: parent.height + 1,
            timestamp: parent.timestamp + 1_000,
            prev_hash: parent.hash.clone(),
            data: BlockData { miner_tag: "t".into(), txs: vec![] },
            nonce,
            difficulty: 1,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    #[test]
    fn new_tree_holds_genesis() {
        let tree = BlockTree::new();
        assert_eq!(tree.len(), 1);
        assert!(tree.contains(genesis::genesis_hash()));
        assert_eq!(tree.cumulative_difficulty(genesis::genesis_hash()), Some(0));
    }

    #[test]
    fn insert_child_accumulates_difficulty() {
        let mut tree = BlockTree::new();
        let b1 = child_of(genesis::genesis_block(), 1);
        let b2 = child_of(&b1, 2);

        assert_eq!(tree.insert_child(b1.clone()), Some(1));
        assert_eq!(tree.insert_child(b2.clone()), Some(2));
        assert_eq!(tree.cumulative_difficulty(&b2.hash), Some(2));
    }

    #[test]
    fn insert_child_without_parent_fails() {
        let mut tree = BlockTree::new();
        let b1 = child_of(genesis::genesis_block(), 1);
        let b2 = child_of(&b1, 2);
        assert_eq!(tree.insert_child(b2), None);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn path_walks_to_genesis() {
        let mut tree = BlockTree::new();
        let b1 = child_of(genesis::genesis_block(), 1);
        let b2 = child_of(&b1, 2);
        tree.insert_child(b1.clone());
        tree.insert_child(b2.clone());

        let path = tree.path_to(&b2.hash).unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path[0].hash, *genesis::genesis_hash());
        assert_eq!(path[1].hash, b1.hash);
        assert_eq!(path[2].hash, b2.hash);
    }

    #[test]
    fn path_to_unknown_is_none() {
        let tree = BlockTree::new();
        assert!(tree.path_to("missing").is_none());
    }

    #[test]
    fn forked_paths_are_distinct() {
        let mut tree = BlockTree::new();
        let a = child_of(genesis::genesis_block(), 1);
        let b = child_of(genesis::genesis_block(), 2);
        tree.insert_child(a.clone());
        tree.insert_child(b.clone());

        assert_ne!(a.hash, b.hash);
        assert_eq!(tree.path_to(&a.hash).unwrap().len(), 2);
        assert_eq!(tree.path_to(&b.hash).unwrap().len(), 2);
    }

    #[test]
    fn orphans_round_trip() {
        let mut tree = BlockTree::new();
        let b1 = child_of(genesis::genesis_block(), 1);
        let b2 = child_of(&b1, 2);
        let b3 = child_of(&b1, 3);

        tree.add_orphan(b2.clone());
        tree.add_orphan(b3.clone());
        assert_eq!(tree.orphan_count(), 2);
        assert_eq!(tree.missing_parents(), vec![b1.hash.clone()]);

        let drained = tree.take_orphans(&b1.hash);
        assert_eq!(drained.len(), 2);
        assert_eq!(tree.orphan_count(), 0);
        assert!(tree.take_orphans(&b1.hash).is_empty());
    }

    #[test]
    fn duplicate_orphan_ignored() {
        let mut tree = BlockTree::new();
        let b1 = child_of(genesis::genesis_block(), 1);
        let b2 = child_of(&b1, 2);
        tree.add_orphan(b2.clone());
        tree.add_orphan(b2);
        assert_eq!(tree.orphan_count(), 1);
    }
}

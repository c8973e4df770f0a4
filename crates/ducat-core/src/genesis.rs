//! The hardcoded genesis block.
//!
//! Every Ducat node computes the identical genesis: height 0, timestamp
//! 0, all-zero parent hash, empty body, difficulty 0. A peer whose chain
//! starts anywhere else is running a different network and is rejected
//! at sync time.

use std::sync::LazyLock;

use crate::constants::GENESIS_PREV_HASH;
use crate::types::{Block, BlockData};

struct GenesisData {
    block: Block,
    hash: String,
}

static GENESIS: LazyLock<GenesisData> = LazyLock::new(build_genesis);

fn build_genesis() -> GenesisData {
    let mut block = Block {
        height: 0,
        timestamp: 0,
        prev_hash: GENESIS_PREV_HASH.to_string(),
        data: BlockData { miner_tag: String::new(), txs: Vec::new() },
        nonce: 0,
        difficulty: 0,
        hash: String::new(),
    };
    block.hash = block.compute_hash();
    let hash = block.hash.clone();
    GenesisData { block, hash }
}

/// The genesis block (height 0).
pub fn genesis_block() -> &'static Block {
    &GENESIS.block
}

/// The genesis header hash.
pub fn genesis_hash() -> &'static str {
    &GENESIS.hash
}

/// Check whether a block is the hardcoded genesis.
pub fn is_genesis(block: &Block) -> bool {
    block.hash == GENESIS.hash && block.compute_hash() == GENESIS.hash
}

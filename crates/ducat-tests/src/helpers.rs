//! Shared test helpers: deterministic keys, block solving, and an
//! in-process peer network.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use ducat_core::hashing;
use ducat_core::types::{Block, BlockData, Transaction};
use ducat_node_lib::gossip::{
    BlockPush, PeerTransport, RegisterReply, TransportError,
};
use ducat_node_lib::{Node, NodeConfig};
use ducat_wallet::WalletKey;

/// Difficulty used across the integration suites: low enough that a
/// block solves in a handful of hash attempts.
pub const TEST_DIFFICULTY: u32 = 1;

/// Deterministic key fixture.
pub fn key(seed: u8) -> WalletKey {
    WalletKey::from_secret_bytes([seed; 32])
}

/// Solve a child of `parent` carrying `txs` at [`TEST_DIFFICULTY`].
pub fn solve_child(parent: &Block, txs: Vec<Transaction>) -> Block {
    let mut block = Block {
        height: parent.height + 1,
        timestamp: parent.timestamp + 1_000,
        prev_hash: parent.hash.clone(),
        data: BlockData { miner_tag: "test".into(), txs },
        nonce: 0,
        difficulty: TEST_DIFFICULTY,
        hash: String::new(),
    };
    loop {
        block.hash = block.compute_hash();
        if hashing::meets_difficulty(&block.hash, block.difficulty) {
            return block;
        }
        block.nonce += 1;
    }
}

/// Solve a coinbase-only child paying `miner`.
pub fn mined_child(parent: &Block, miner: &str) -> Block {
    let coinbase = Transaction::coinbase(miner, parent.height + 1);
    solve_child(parent, vec![coinbase])
}

/// A push envelope with no trail, as a wallet-less origin would send.
pub fn push(block: Block) -> BlockPush {
    BlockPush { block, sender: None, previous_peers: Vec::new() }
}

/// In-process peer network: transport calls route directly into other
/// node instances, so multi-node scenarios run without sockets.
#[derive(Default)]
pub struct LoopbackNet {
    nodes: RwLock<HashMap<String, Arc<Node>>>,
}

impl LoopbackNet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Create a node reachable at `url` on this network.
    pub fn spawn_node(self: &Arc<Self>, url: &str, config: NodeConfig) -> Arc<Node> {
        let config = NodeConfig { public_url: Some(url.to_string()), ..config };
        let node = Node::new(config, self.clone());
        self.nodes.write().insert(url.to_string(), node.clone());
        node
    }

    fn get(&self, url: &str) -> Result<Arc<Node>, TransportError> {
        self.nodes
            .read()
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Http(format!("unknown peer {url}")))
    }
}

#[async_trait]
impl PeerTransport for LoopbackNet {
    async fn register(&self, peer: &str, own_url: &str) -> Result<RegisterReply, TransportError> {
        let node = self.get(peer)?;
        let peers = node.register_peers(vec![own_url.to_string()]);
        Ok(RegisterReply {
            ok: true,
            urls: vec![own_url.to_string()],
            responder: peer.to_string(),
            peers,
        })
    }

    async fn deregister(&self, peer: &str, own_url: &str) -> Result<(), TransportError> {
        self.get(peer)?.deregister_peers(vec![own_url.to_string()]);
        Ok(())
    }

    async fn ping(&self, peer: &str, _from: &str) -> Result<(), TransportError> {
        self.get(peer).map(|_| ())
    }

    async fn push_block(&self, peer: &str, push: BlockPush) -> Result<(), TransportError> {
        self.get(peer)?.handle_block_push(push);
        Ok(())
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, TransportError> {
        Ok(self.get(peer)?.chain())
    }

    async fn fetch_block(&self, peer: &str, hash: &str) -> Result<Option<Block>, TransportError> {
        Ok(self.get(peer)?.block_by_hash(hash))
    }
}

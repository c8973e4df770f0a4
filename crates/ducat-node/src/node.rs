//! Full node composition and the mining driver.
//!
//! The [`Node`] owns the ledger (chain controller + mempool) behind a
//! single mutex so that every handler commits a complete state
//! transition — ingest, reorganization, mempool repair — before anything
//! else observes the state. The miner runs on a blocking worker and
//! coordinates with the node through a result channel and one shared
//! cancel word.
//!
//! Lock discipline: `ledger` and `miner` are never held at the same
//! time, and the cancel word is only written while holding `miner`.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ducat_consensus::engine::{ChainController, IngestStatus, SyncOutcome, TipChange};
use ducat_consensus::miner::{self, MineJob, MineOutcome};
use ducat_core::constants::{BLOCK_TX_CAP, MINE_DEBOUNCE_MS};
use ducat_core::error::MempoolError;
use ducat_core::mempool::Mempool;
use ducat_core::types::{Block, Transaction};
use ducat_core::utxo::Utxo;
use ducat_core::validation;

use crate::config::NodeConfig;
use crate::gossip::{BlockPush, NullTransport, PeerTransport};

/// Delay before a crashed mining worker is respawned.
const MINER_RESPAWN_BACKOFF: Duration = Duration::from_secs(1);
/// Interval between liveness probes to registered peers.
const PING_INTERVAL: Duration = Duration::from_secs(60);

/// Chain state plus the pending pool, mutated together under one lock.
struct Ledger {
    chain: ChainController,
    pool: Mempool,
}

/// Miner driver bookkeeping. The cancel word lives outside so the
/// worker can poll it without touching this lock.
#[derive(Default)]
struct MinerState {
    enabled: bool,
    job_running: bool,
    restart_pending: bool,
    debounce_queued: bool,
}

enum JobResult {
    Outcome(MineOutcome),
    Crashed,
}

/// Node-level verdict on a pushed block, mapped onto the HTTP reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockPushOutcome {
    Accepted,
    /// Already known, or we are on the propagation trail.
    Ignored,
    /// Parent unknown; stored as orphan and being fetched.
    Gap,
    Invalid(String),
}

/// The full node: ledger, peer set, miner driver, transport.
pub struct Node {
    config: NodeConfig,
    ledger: Mutex<Ledger>,
    peers: RwLock<BTreeSet<String>>,
    miner: Mutex<MinerState>,
    cancel: Arc<AtomicBool>,
    transport: Arc<dyn PeerTransport>,
    results_tx: mpsc::UnboundedSender<JobResult>,
    results_rx: Mutex<Option<mpsc::UnboundedReceiver<JobResult>>>,
}

impl Node {
    /// Build a node with the given transport. Call [`Node::start`] from
    /// within a tokio runtime to launch the background loops.
    pub fn new(config: NodeConfig, transport: Arc<dyn PeerTransport>) -> Arc<Self> {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            ledger: Mutex::new(Ledger {
                chain: ChainController::new(config.difficulty),
                pool: Mempool::new(),
            }),
            peers: RwLock::new(BTreeSet::new()),
            miner: Mutex::new(MinerState::default()),
            cancel: Arc::new(AtomicBool::new(false)),
            transport,
            results_tx,
            results_rx: Mutex::new(Some(results_rx)),
            config,
        })
    }

    /// Node without networking: outbound calls are disabled, ingress
    /// still works. Used by tests and single-node setups.
    pub fn without_network(config: NodeConfig) -> Arc<Self> {
        Self::new(config, Arc::new(NullTransport))
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Launch the miner result loop and the peer ping loop, register
    /// with the configured bootstrap peers, and start mining if enabled.
    pub async fn start(self: &Arc<Self>) {
        self.spawn_result_loop();
        self.spawn_ping_loop();

        for peer in self.config.peers.clone() {
            self.connect_peer(&peer).await;
        }

        if self.config.mine {
            self.set_mining(true);
        }
    }

    // ------------------------------------------------------------------
    // Block ingress
    // ------------------------------------------------------------------

    /// Ingest a pushed block: the single acceptance path for blocks
    /// from peers and from our own miner.
    pub fn handle_block_push(self: &Arc<Self>, push: BlockPush) -> BlockPushOutcome {
        let own_url = self.config.public_url();
        if push.previous_peers.contains(&own_url) {
            debug!(block = %push.block.hash, "already on propagation trail");
            return BlockPushOutcome::Ignored;
        }

        let block_hash = push.block.hash.clone();
        let (status, tip_changed) = {
            let mut ledger = self.ledger.lock();
            let result = ledger.chain.ingest(push.block.clone());
            if let Some(change) = &result.tip_change {
                repair_mempool(&mut ledger, change);
            }
            (result.status, result.tip_change.is_some())
        };

        if tip_changed {
            self.schedule_restart();
        }

        match status {
            IngestStatus::Accepted => {
                self.spawn_broadcast(push.block, push.previous_peers, push.sender);
                BlockPushOutcome::Accepted
            }
            IngestStatus::AlreadyKnown => BlockPushOutcome::Ignored,
            IngestStatus::Orphaned { missing_parent } => {
                info!(block = %block_hash, missing = %missing_parent, "gap detected");
                self.spawn_orphan_resolution(missing_parent, push.sender);
                BlockPushOutcome::Gap
            }
            IngestStatus::Rejected(err) => {
                warn!(block = %block_hash, %err, "rejected block");
                BlockPushOutcome::Invalid(err.to_string())
            }
        }
    }

    /// Forward an accepted block to peers not yet on its trail.
    fn spawn_broadcast(
        self: &Arc<Self>,
        block: Block,
        mut trail: Vec<String>,
        sender: Option<String>,
    ) {
        let own_url = self.config.public_url();
        trail.push(own_url.clone());

        let targets: Vec<String> = self
            .peers
            .read()
            .iter()
            .filter(|peer| !trail.contains(*peer) && Some(peer.as_str()) != sender.as_deref())
            .cloned()
            .collect();
        if targets.is_empty() {
            return;
        }

        let transport = self.transport.clone();
        tokio::spawn(async move {
            for peer in targets {
                let push = BlockPush {
                    block: block.clone(),
                    sender: Some(own_url.clone()),
                    previous_peers: trail.clone(),
                };
                if let Err(err) = transport.push_block(&peer, push).await {
                    warn!(%peer, %err, "block broadcast failed");
                }
            }
        });
    }

    /// Fetch a missing parent from peers, and resync from the sender
    /// that revealed the gap.
    fn spawn_orphan_resolution(self: &Arc<Self>, missing: String, sender: Option<String>) {
        let node = self.clone();
        tokio::spawn(async move {
            let peers: Vec<String> = node.peers.read().iter().cloned().collect();
            for peer in peers {
                match node.transport.fetch_block(&peer, &missing).await {
                    Ok(Some(block)) => {
                        debug!(%peer, block = %missing, "fetched missing parent");
                        node.handle_block_push(BlockPush {
                            block,
                            sender: None,
                            previous_peers: Vec::new(),
                        });
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => warn!(%peer, %err, "parent fetch failed"),
                }
            }
            // No peer had the block; fall back to a full sync.
            if let Some(sender) = sender {
                node.sync_from(&sender).await;
            }
        });
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Validate and pool a submitted transaction.
    pub fn submit_transaction(self: &Arc<Self>, tx: Transaction) -> Result<String, MempoolError> {
        let id = {
            let mut ledger = self.ledger.lock();
            validation::validate_transaction(&tx, ledger.chain.utxos())?;
            let id = tx.id.clone();
            ledger.pool.insert(tx)?;
            id
        };
        info!(tx = %id, "pooled transaction");
        self.schedule_restart();
        Ok(id)
    }

    /// UTXOs owned by `address`, excluding any consumed by pending pool
    /// transactions, so wallets never double-offer an input.
    pub fn available_utxos(&self, address: &str) -> Vec<Utxo> {
        let ledger = self.ledger.lock();
        ledger
            .chain
            .utxos()
            .owned_by(address)
            .into_iter()
            .filter(|utxo| !ledger.pool.consumes(&utxo.outpoint()))
            .collect()
    }

    /// Spendable balance of `address` (pool-consumed outputs excluded).
    pub fn balance(&self, address: &str) -> u64 {
        self.available_utxos(address).iter().map(|u| u.amount).sum()
    }

    pub fn pool_txids(&self) -> Vec<String> {
        self.ledger.lock().pool.txids()
    }

    // ------------------------------------------------------------------
    // Chain queries
    // ------------------------------------------------------------------

    pub fn chain(&self) -> Vec<Block> {
        self.ledger.lock().chain.canonical_chain()
    }

    /// `(tip hash, height, difficulty)`.
    pub fn latest(&self) -> (String, u64, u32) {
        let ledger = self.ledger.lock();
        (
            ledger.chain.tip_hash().to_string(),
            ledger.chain.height(),
            ledger.chain.difficulty(),
        )
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<Block> {
        self.ledger.lock().chain.block_by_hash(hash).cloned()
    }

    // ------------------------------------------------------------------
    // Peers
    // ------------------------------------------------------------------

    /// Handle an inbound registration: adopt the URLs and reveal our
    /// current peer list.
    pub fn register_peers(&self, urls: Vec<String>) -> Vec<String> {
        let own_url = self.config.public_url();
        let mut peers = self.peers.write();
        for url in urls {
            if url != own_url {
                peers.insert(url);
            }
        }
        peers.iter().cloned().collect()
    }

    /// Handle an inbound deregistration. Local effect only.
    pub fn deregister_peers(&self, urls: Vec<String>) -> Vec<String> {
        let mut peers = self.peers.write();
        for url in urls {
            peers.remove(&url);
        }
        peers.iter().cloned().collect()
    }

    pub fn peer_list(&self) -> Vec<String> {
        self.peers.read().iter().cloned().collect()
    }

    /// Register with a peer, merge its peer list, and sync its chain.
    pub async fn connect_peer(self: &Arc<Self>, peer: &str) {
        let own_url = self.config.public_url();
        match self.transport.register(peer, &own_url).await {
            Ok(reply) => {
                let mut discovered = reply.peers;
                discovered.push(peer.to_string());
                self.register_peers(discovered);
                info!(%peer, "registered with peer");
            }
            Err(err) => {
                // Keep the peer; broadcasts and pings will retry it.
                warn!(%peer, %err, "peer registration failed");
                self.register_peers(vec![peer.to_string()]);
            }
        }
        self.sync_from(peer).await;
    }

    /// Fetch a peer's full chain and adopt it if strictly heavier.
    pub async fn sync_from(self: &Arc<Self>, peer: &str) {
        let chain = match self.transport.fetch_chain(peer).await {
            Ok(chain) => chain,
            Err(err) => {
                warn!(%peer, %err, "chain fetch failed");
                return;
            }
        };

        let replaced = {
            let mut ledger = self.ledger.lock();
            match ledger.chain.replace_chain(chain) {
                Ok(SyncOutcome::Replaced(change)) => {
                    repair_mempool(&mut ledger, &change);
                    true
                }
                Ok(SyncOutcome::KeptLocal) => false,
                Err(err) => {
                    warn!(%peer, %err, "peer chain rejected");
                    false
                }
            }
        };

        if replaced {
            info!(%peer, "synced chain from peer");
            self.schedule_restart();
        }
    }

    fn spawn_ping_loop(self: &Arc<Self>) {
        let node = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PING_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let own_url = node.config.public_url();
                let peers: Vec<String> = node.peers.read().iter().cloned().collect();
                for peer in peers {
                    if let Err(err) = node.transport.ping(&peer, &own_url).await {
                        // Unreachable peers stay registered; the next
                        // probe or broadcast retries them.
                        warn!(%peer, %err, "ping failed");
                    }
                }
            }
        });
    }

    // ------------------------------------------------------------------
    // Mining driver
    // ------------------------------------------------------------------

    /// Enable or disable mining. Returns `(old, new)` status strings.
    pub fn set_mining(self: &Arc<Self>, enable: bool) -> (String, String) {
        let (old, changed) = {
            let mut miner = self.miner.lock();
            let old = status_string(miner.enabled);
            let changed = miner.enabled != enable;
            miner.enabled = enable;
            if !enable {
                miner.restart_pending = false;
                self.cancel.store(true, Ordering::Relaxed);
            }
            (old, changed)
        };
        if enable && changed {
            self.schedule_restart();
        }
        (old, status_string(enable))
    }

    /// Request a restart of the current mining job (no status change).
    pub fn restart_mining(self: &Arc<Self>) -> (String, String) {
        let status = self.mining_status();
        self.schedule_restart();
        (status.clone(), status)
    }

    pub fn mining_status(&self) -> String {
        status_string(self.miner.lock().enabled)
    }

    /// Ask the driver to (re)start mining after a quiet debounce window.
    ///
    /// Tip changes and mempool changes funnel through here; while a job
    /// is running the debounce cancels it and marks a restart, otherwise
    /// a new job starts straight away.
    fn schedule_restart(self: &Arc<Self>) {
        {
            let mut miner = self.miner.lock();
            if !miner.enabled || miner.debounce_queued {
                return;
            }
            miner.debounce_queued = true;
        }

        let node = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(MINE_DEBOUNCE_MS)).await;
            let start = {
                let mut miner = node.miner.lock();
                miner.debounce_queued = false;
                if !miner.enabled {
                    false
                } else if miner.job_running {
                    node.cancel.store(true, Ordering::Relaxed);
                    miner.restart_pending = true;
                    false
                } else {
                    true
                }
            };
            if start {
                node.start_job();
            }
        });
    }

    /// Assemble a candidate block and hand it to a blocking worker.
    fn start_job(self: &Arc<Self>) {
        let job = {
            let ledger = self.ledger.lock();
            let tip = ledger.chain.tip_block();
            let height = tip.height + 1;

            let mut txs = vec![Transaction::coinbase(&self.config.miner_address, height)];
            for tx in ledger.pool.iter() {
                if txs.len() > BLOCK_TX_CAP {
                    break;
                }
                // Pool entries are pairwise disjoint; stale ones are
                // skipped rather than poisoning the candidate.
                if validation::validate_transaction(tx, ledger.chain.utxos()).is_ok() {
                    txs.push(tx.clone());
                }
            }

            MineJob {
                height,
                prev_hash: tip.hash.clone(),
                difficulty: ledger.chain.difficulty(),
                miner_tag: self.config.miner_tag.clone(),
                txs,
                min_timestamp: tip.timestamp,
            }
        };

        {
            let mut miner = self.miner.lock();
            if miner.job_running {
                return;
            }
            miner.job_running = true;
            self.cancel.store(false, Ordering::Relaxed);
        }

        debug!(height = job.height, txs = job.txs.len(), "starting mining job");
        let cancel = self.cancel.clone();
        let results = self.results_tx.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || miner::mine(&job, &cancel)).await;
            let message = match result {
                Ok(outcome) => JobResult::Outcome(outcome),
                Err(_) => JobResult::Crashed,
            };
            let _ = results.send(message);
        });
    }

    fn spawn_result_loop(self: &Arc<Self>) {
        let mut rx = self
            .results_rx
            .lock()
            .take()
            .expect("start() may only run once");
        let node = self.clone();
        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    JobResult::Outcome(MineOutcome::Mined(block)) => {
                        node.finish_job();
                        info!(hash = %block.hash, height = block.height, "mined block");
                        let outcome = node.handle_block_push(BlockPush {
                            block,
                            sender: None,
                            previous_peers: Vec::new(),
                        });
                        if !matches!(outcome, BlockPushOutcome::Accepted) {
                            warn!(?outcome, "mined block was not accepted");
                        }
                        node.resume_after_job();
                    }
                    JobResult::Outcome(MineOutcome::Cancelled) => {
                        debug!("mining job cancelled");
                        node.finish_job();
                        node.resume_after_job();
                    }
                    JobResult::Crashed => {
                        warn!("mining worker crashed; respawning");
                        node.finish_job();
                        tokio::time::sleep(MINER_RESPAWN_BACKOFF).await;
                        let reissue = {
                            let miner = node.miner.lock();
                            miner.enabled && !miner.job_running
                        };
                        if reissue {
                            node.start_job();
                        }
                    }
                }
            }
        });
    }

    fn finish_job(&self) {
        self.miner.lock().job_running = false;
    }

    /// Completion and cancellation release the interlock the same way:
    /// a pending restart fires immediately.
    fn resume_after_job(self: &Arc<Self>) {
        let start = {
            let mut miner = self.miner.lock();
            if miner.enabled && miner.restart_pending && !miner.job_running {
                miner.restart_pending = false;
                true
            } else {
                false
            }
        };
        if start {
            self.start_job();
        }
    }
}

fn status_string(enabled: bool) -> String {
    if enabled { "running".to_string() } else { "stopped".to_string() }
}

/// Reconcile the mempool with a canonical-chain change.
///
/// Transactions included by newly connected blocks leave the pool;
/// transactions from detached blocks are re-admitted when they still
/// validate against the new UTXO state and don't conflict with what the
/// pool already holds. Everything else is dropped silently.
fn repair_mempool(ledger: &mut Ledger, change: &TipChange) {
    let connected_ids: HashSet<&str> = change
        .connected
        .iter()
        .flat_map(|block| block.data.txs.iter())
        .map(|tx| tx.id.as_str())
        .collect();

    let mut candidates = ledger.pool.drain();
    candidates.extend(
        change
            .detached
            .iter()
            .flat_map(|block| block.data.txs.iter())
            .filter(|tx| !tx.is_coinbase())
            .cloned(),
    );

    for tx in candidates {
        if connected_ids.contains(tx.id.as_str()) {
            continue;
        }
        if validation::validate_transaction(&tx, ledger.chain.utxos()).is_err() {
            debug!(tx = %tx.id, "dropping stale pool transaction");
            continue;
        }
        // Conflicts between survivors resolve first-come.
        if let Err(err) = ledger.pool.insert(tx) {
            debug!(%err, "dropping conflicting pool transaction");
        }
    }
}

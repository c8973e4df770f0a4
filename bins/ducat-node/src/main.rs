//! Ducat full node binary.
//!
//! Starts an in-memory node with an HTTP boundary, registers with the
//! given bootstrap peers, syncs their chains, and optionally mines in
//! the background.

use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info};

use ducat_core::constants::{DEFAULT_HTTP_PORT, MAX_DIFFICULTY};
use ducat_node_lib::{router, HttpTransport, Node, NodeConfig};

/// Ducat full node — educational UTXO proof-of-work over HTTP gossip.
#[derive(Parser, Debug)]
#[command(name = "ducat-node", version, about = "Ducat full node")]
struct Args {
    /// HTTP bind address
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// HTTP port
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u16,

    /// URL peers should use to reach this node (default: http://{bind}:{port})
    #[arg(long)]
    public_url: Option<String>,

    /// Required leading zero hex digits in block hashes (network-wide)
    #[arg(long, default_value_t = 3)]
    difficulty: u32,

    /// Mine blocks in the background
    #[arg(long)]
    mine: bool,

    /// Address credited by mined coinbases (required with --mine)
    #[arg(long, default_value = "")]
    miner_address: String,

    /// Tag stamped into mined blocks
    #[arg(long, default_value = "ducat-node")]
    miner_tag: String,

    /// Bootstrap peers (comma-separated URLs)
    #[arg(long, value_delimiter = ',')]
    peers: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn into_config(self) -> Result<(NodeConfig, String)> {
        if self.mine && self.miner_address.is_empty() {
            bail!("--mine requires --miner-address");
        }
        if self.difficulty > MAX_DIFFICULTY {
            bail!("--difficulty must be at most {MAX_DIFFICULTY}");
        }
        let config = NodeConfig {
            bind: self.bind,
            port: self.port,
            public_url: self.public_url,
            difficulty: self.difficulty,
            mine: self.mine,
            miner_address: self.miner_address,
            miner_tag: self.miner_tag,
            peers: self.peers,
            log_level: self.log_level,
        };
        Ok((config, self.log_format))
    }
}

fn init_logging(log_level: &str, log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    if log_format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn run(config: NodeConfig) -> Result<()> {
    let listen_addr = config.listen_addr();
    let node = Node::new(config, Arc::new(HttpTransport::new()));

    // Binding the port is the one fatal startup error.
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    node.start().await;

    info!(
        addr = %listen_addr,
        url = %node.config().public_url(),
        difficulty = node.config().difficulty,
        mining = node.config().mine,
        "ducat node listening",
    );

    axum::serve(listener, router(node))
        .await
        .context("HTTP server error")?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let (config, log_format) = match args.into_config() {
        Ok(parts) => parts,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    init_logging(&config.log_level, &log_format);

    if let Err(err) = run(config).await {
        error!("{err:#}");
        process::exit(1);
    }
}

//! Node configuration.

use ducat_core::constants::DEFAULT_HTTP_PORT;

/// Configuration for a node instance.
///
/// `difficulty` is a fixed network parameter — every node on a network
/// must run the same value or reject each other's blocks.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// URL peers should use to reach this node. Defaults to
    /// `http://{bind}:{port}`.
    pub public_url: Option<String>,
    /// Required leading zero hex digits in block hashes.
    pub difficulty: u32,
    /// Whether to mine in the background.
    pub mine: bool,
    /// Address credited by this node's coinbases.
    pub miner_address: String,
    /// Free-form tag stamped into mined blocks.
    pub miner_tag: String,
    /// Peers to register with at startup.
    pub peers: Vec<String>,
    /// Log level filter string (e.g. "info", "ducat_node_lib=debug").
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_HTTP_PORT,
            public_url: None,
            difficulty: 3,
            mine: false,
            miner_address: String::new(),
            miner_tag: "ducat-node".to_string(),
            peers: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Socket address string for the HTTP listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// The URL this node advertises to peers.
    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.bind, self.port))
    }
}

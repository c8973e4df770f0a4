//! # ducat-node — full node: gossip, mining driver, HTTP boundary.
//!
//! Composes the Ducat subsystems into a running node:
//! - [`node::Node`] — ledger (chain + mempool), peer set, miner driver
//! - [`gossip`] — peer transport trait and its reqwest implementation
//! - [`rpc`] — axum router, a thin adapter over node operations
//! - [`config::NodeConfig`] — node configuration

pub mod config;
pub mod gossip;
pub mod node;
pub mod rpc;

pub use config::NodeConfig;
pub use gossip::{HttpTransport, PeerTransport};
pub use node::Node;
pub use rpc::router;

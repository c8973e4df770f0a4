//! Peer wire messages and the outbound transport.
//!
//! [`PeerTransport`] is the seam between the node and the network: the
//! production implementation speaks JSON over HTTP with reqwest, and
//! tests swap in an in-process implementation that routes calls straight
//! into other node instances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ducat_core::types::Block;

/// A gossiped block together with its propagation trail.
///
/// Each hop appends its own URL to `previous_peers` before forwarding,
/// and never forwards to a peer already on the trail, so one origin
/// block induces a bounded gossip tree rather than a flood.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BlockPush {
    pub block: Block,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default)]
    pub previous_peers: Vec<String>,
}

/// Peer (de)registration body: one URL, many, or both.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl RegisterRequest {
    /// All URLs named by the request.
    pub fn all_urls(&self) -> Vec<String> {
        let mut urls = self.urls.clone();
        if let Some(url) = &self.url {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        urls
    }
}

/// Registration response: the responder reveals its peer list so the
/// registrant can merge it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RegisterReply {
    pub ok: bool,
    pub urls: Vec<String>,
    pub responder: String,
    pub peers: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChainReply {
    pub chain: Vec<Block>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BlockReply {
    pub ok: bool,
    pub block: Block,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("http: {0}")] Http(String),
    #[error("peer returned status {0}")] Status(u16),
    #[error("network disabled")] Disabled,
}

/// Outbound calls to one peer. Implemented over HTTP in production and
/// in-process in tests.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Announce ourselves; the reply carries the peer's own peer list.
    async fn register(&self, peer: &str, own_url: &str) -> Result<RegisterReply, TransportError>;

    /// Remove ourselves from the peer's set.
    async fn deregister(&self, peer: &str, own_url: &str) -> Result<(), TransportError>;

    /// Liveness probe.
    async fn ping(&self, peer: &str, from: &str) -> Result<(), TransportError>;

    /// Push a block with its propagation trail.
    async fn push_block(&self, peer: &str, push: BlockPush) -> Result<(), TransportError>;

    /// Fetch the peer's full chain, genesis first.
    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, TransportError>;

    /// Point lookup of a block by hash. `Ok(None)` when unknown.
    async fn fetch_block(&self, peer: &str, hash: &str) -> Result<Option<Block>, TransportError>;
}

/// Production transport: JSON over HTTP via reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn http_err(e: reqwest::Error) -> TransportError {
    TransportError::Http(e.to_string())
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn register(&self, peer: &str, own_url: &str) -> Result<RegisterReply, TransportError> {
        let body = RegisterRequest { url: Some(own_url.to_string()), urls: Vec::new() };
        let response = self
            .client
            .post(format!("{peer}/peers/register"))
            .json(&body)
            .send()
            .await
            .map_err(http_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        response.json().await.map_err(http_err)
    }

    async fn deregister(&self, peer: &str, own_url: &str) -> Result<(), TransportError> {
        let body = RegisterRequest { url: Some(own_url.to_string()), urls: Vec::new() };
        let response = self
            .client
            .post(format!("{peer}/peers/deregister"))
            .json(&body)
            .send()
            .await
            .map_err(http_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn ping(&self, peer: &str, from: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .get(format!("{peer}/ping"))
            .query(&[("from", from)])
            .send()
            .await
            .map_err(http_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn push_block(&self, peer: &str, push: BlockPush) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{peer}/blocks"))
            .json(&push)
            .send()
            .await
            .map_err(http_err)?;
        // Invalid-block responses are the peer's verdict, not a transport
        // failure; only transport-level errors surface here.
        if response.status().is_server_error() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        Ok(())
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, TransportError> {
        let response = self
            .client
            .get(format!("{peer}/chain"))
            .send()
            .await
            .map_err(http_err)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let reply: ChainReply = response.json().await.map_err(http_err)?;
        Ok(reply.chain)
    }

    async fn fetch_block(&self, peer: &str, hash: &str) -> Result<Option<Block>, TransportError> {
        let response = self
            .client
            .get(format!("{peer}/blocks/{hash}"))
            .send()
            .await
            .map_err(http_err)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }
        let reply: BlockReply = response.json().await.map_err(http_err)?;
        Ok(Some(reply.block))
    }
}

/// Transport for a node running without a network (single-node mode and
/// unit tests). Every outbound call reports [`TransportError::Disabled`].
pub struct NullTransport;

#[async_trait]
impl PeerTransport for NullTransport {
    async fn register(&self, _: &str, _: &str) -> Result<RegisterReply, TransportError> {
        Err(TransportError::Disabled)
    }

    async fn deregister(&self, _: &str, _: &str) -> Result<(), TransportError> {
        Err(TransportError::Disabled)
    }

    async fn ping(&self, _: &str, _: &str) -> Result<(), TransportError> {
        Err(TransportError::Disabled)
    }

    async fn push_block(&self, _: &str, _: BlockPush) -> Result<(), TransportError> {
        Err(TransportError::Disabled)
    }

    async fn fetch_chain(&self, _: &str) -> Result<Vec<Block>, TransportError> {
        Err(TransportError::Disabled)
    }

    async fn fetch_block(&self, _: &str, _: &str) -> Result<Option<Block>, TransportError> {
        Err(TransportError::Disabled)
    }
}

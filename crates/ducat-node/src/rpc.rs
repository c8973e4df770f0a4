//! Axum router and HTTP handlers.
//!
//! A thin adapter: handlers deserialize the wire body, call one node
//! operation, and serialize the reply. All consensus and pool logic
//! lives behind [`Node`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use ducat_core::types::Transaction;

use crate::gossip::{BlockPush, RegisterReply, RegisterRequest};
use crate::node::{BlockPushOutcome, Node};

/// Build the node's HTTP router.
pub fn router(node: Arc<Node>) -> Router {
    Router::new()
        .route("/peers/register", post(register))
        .route("/peers/deregister", post(deregister))
        .route("/peers", get(peers))
        .route("/ping", get(ping))
        .route("/chain", get(chain))
        .route("/blocks/latest", get(latest))
        .route("/blocks/:hash", get(block_by_hash))
        .route("/blocks", post(push_block))
        .route("/transactions", post(submit_transaction))
        .route("/unspent/:address", get(unspent))
        .route("/balance/:address", get(balance))
        .route("/mining/start", post(mining_start))
        .route("/mining/stop", post(mining_stop))
        .route("/mining/restart", post(mining_restart))
        .with_state(node)
}

async fn register(
    State(node): State<Arc<Node>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let urls = req.all_urls();
    let peers = node.register_peers(urls.clone());
    Json(RegisterReply {
        ok: true,
        urls,
        responder: node.config().public_url(),
        peers,
    })
}

async fn deregister(
    State(node): State<Arc<Node>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let urls = req.all_urls();
    let peers = node.deregister_peers(urls.clone());
    Json(RegisterReply {
        ok: true,
        urls,
        responder: node.config().public_url(),
        peers,
    })
}

async fn peers(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(json!({ "peers": node.peer_list() }))
}

#[derive(Deserialize)]
struct PingQuery {
    #[serde(default)]
    from: Option<String>,
}

async fn ping(Query(query): Query<PingQuery>) -> impl IntoResponse {
    if let Some(from) = query.from {
        tracing::debug!(%from, "ping");
    }
    Json(json!({ "ok": true, "pong": true }))
}

async fn chain(State(node): State<Arc<Node>>) -> impl IntoResponse {
    Json(json!({ "chain": node.chain() }))
}

async fn latest(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let (latest, height, difficulty) = node.latest();
    Json(json!({ "latest": latest, "height": height, "difficulty": difficulty }))
}

async fn block_by_hash(
    State(node): State<Arc<Node>>,
    Path(hash): Path<String>,
) -> impl IntoResponse {
    match node.block_by_hash(&hash) {
        Some(block) => (StatusCode::OK, Json(json!({ "ok": true, "block": block }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "unknown block" })),
        ),
    }
}

async fn push_block(
    State(node): State<Arc<Node>>,
    Json(push): Json<BlockPush>,
) -> impl IntoResponse {
    match node.handle_block_push(push) {
        BlockPushOutcome::Accepted => {
            (StatusCode::OK, Json(json!({ "ok": true, "status": "accepted" })))
        }
        BlockPushOutcome::Ignored => {
            (StatusCode::OK, Json(json!({ "ok": true, "status": "ignored" })))
        }
        BlockPushOutcome::Gap => {
            (StatusCode::OK, Json(json!({ "ok": true, "status": "gap" })))
        }
        BlockPushOutcome::Invalid(reason) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "status": "invalid", "error": reason })),
        ),
    }
}

async fn submit_transaction(
    State(node): State<Arc<Node>>,
    Json(tx): Json<Transaction>,
) -> impl IntoResponse {
    match node.submit_transaction(tx) {
        Ok(tx_id) => (StatusCode::OK, Json(json!({ "ok": true, "txId": tx_id }))),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "ok": false, "error": err.to_string() })),
        ),
    }
}

async fn unspent(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    Json(node.available_utxos(&address))
}

async fn balance(
    State(node): State<Arc<Node>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    let balance = node.balance(&address);
    Json(json!({ "address": address, "balance": balance }))
}

async fn mining_start(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let (old, new) = node.set_mining(true);
    Json(json!({ "old": old, "new": new }))
}

async fn mining_stop(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let (old, new) = node.set_mining(false);
    Json(json!({ "old": old, "new": new }))
}

async fn mining_restart(State(node): State<Arc<Node>>) -> impl IntoResponse {
    let (old, new) = node.restart_mining();
    Json(json!({ "old": old, "new": new }))
}

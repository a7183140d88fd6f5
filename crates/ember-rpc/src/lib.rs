//! # ember-rpc
//!
//! HTTP surface of the node: the `/rpc` JSON-RPC endpoint consumed by
//! external miners, and a small REST API for chain introspection and
//! transaction submission. All side effects flow through the chain
//! state machine and the P2P node.

mod error;
mod rest;
mod rpc;
mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Mining JSON-RPC
        .route("/rpc", post(rpc::handle_rpc))
        // Chain introspection
        .route("/api/chain/info", get(rest::chain_info))
        .route("/api/chain/block", get(rest::chain_block))
        .route("/api/chain/mempool", get(rest::chain_mempool))
        .route("/api/chain/balance", get(rest::chain_balance))
        .route("/api/chain/transactions", get(rest::chain_transactions))
        // Transaction submission
        .route("/api/tx/send", post(rest::tx_send))
        .route("/api/tx/stake", post(rest::tx_stake))
        .route("/api/tx/unstake", post(rest::tx_unstake))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the HTTP API until the process exits.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "rpc listening");
    axum::serve(listener, router(state)).await
}

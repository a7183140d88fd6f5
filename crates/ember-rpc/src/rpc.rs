//! The `/rpc` JSON-RPC dispatch for external miners.
//!
//! Method-level failures are JSON-RPC errors in an HTTP 200 response;
//! only transport problems surface as HTTP errors.

use crate::AppState;
use axum::extract::State;
use axum::Json;
use ember_consensus::Block;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

/// Incoming JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Method name.
    pub method: String,
    /// Method parameters, shape depends on the method.
    #[serde(default)]
    pub params: Value,
    /// Caller-chosen request id, echoed back.
    #[serde(default)]
    pub id: Value,
}

/// Outgoing JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Successful result, absent on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error message, absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Echoed request id.
    pub id: Value,
}

fn result(id: Value, value: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        result: Some(value),
        error: None,
        id,
    }
}

fn error(id: Value, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        result: None,
        error: Some(Value::String(message.into())),
        id,
    }
}

#[derive(Debug, Default, Deserialize)]
struct TemplateParams {
    #[serde(default)]
    miner_address: String,
}

/// POST /rpc
pub async fn handle_rpc(State(state): State<AppState>, body: String) -> Json<JsonRpcResponse> {
    let request: JsonRpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => return Json(error(Value::Null, "parse error")),
    };
    debug!(method = %request.method, "rpc request");

    let response = match request.method.as_str() {
        "getblocktemplate" => get_block_template(&state, request),
        "submitblock" => submit_block(&state, request).await,
        "getblockcount" => result(request.id, json!(state.chain.block_count())),
        "getbestblockhash" => {
            let hash = state.chain.best_block().map(|b| b.hash).unwrap_or_default();
            result(request.id, json!(hash))
        }
        "getmininginfo" => {
            let bits = state
                .chain
                .best_block()
                .map(|b| b.header.bits)
                .unwrap_or(0);
            result(
                request.id,
                json!({
                    "blocks": state.chain.block_count(),
                    "difficulty": bits,
                    "network_hash": 0,
                    "staked_total": state.chain.total_staked(),
                    "mempool_size": state.chain.mempool_len(),
                    "peers": state.network.peer_count(),
                }),
            )
        }
        "getpeerinfo" => result(request.id, json!(state.network.peer_addresses())),
        other => error(request.id, format!("unknown method: {other}")),
    };

    Json(response)
}

fn get_block_template(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let params: TemplateParams = serde_json::from_value(request.params).unwrap_or_default();
    if params.miner_address.is_empty() {
        return error(request.id, "miner_address required");
    }
    match state.chain.create_template(&params.miner_address) {
        Ok(template) => match serde_json::to_value(&template) {
            Ok(value) => result(request.id, value),
            Err(e) => error(request.id, e.to_string()),
        },
        Err(e) => error(request.id, e.to_string()),
    }
}

async fn submit_block(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let block: Block = match serde_json::from_value(request.params) {
        Ok(block) => block,
        Err(e) => return error(request.id, format!("invalid block: {e}")),
    };
    if let Err(e) = state.chain.add_block(&block) {
        return error(request.id, e.to_string());
    }
    state.network.broadcast_block(&block).await;
    result(
        request.id,
        json!({
            "accepted": true,
            "hash": block.hash,
            "height": block.header.height,
        }),
    )
}

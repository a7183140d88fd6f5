//! REST chain introspection and transaction submission.

use crate::{ApiError, ApiResult, AppState};
use axum::extract::{Query, State};
use axum::Json;
use ember_consensus::{Transaction, TxKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Default flat transfer fee.
const DEFAULT_FEE: f64 = 0.001;

fn ok(data: impl Serialize) -> Json<Value> {
    Json(json!({ "ok": true, "data": data }))
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// GET /api/chain/info
pub async fn chain_info(State(state): State<AppState>) -> Json<Value> {
    let best = state.chain.best_block();
    let config = state.chain.config();
    ok(json!({
        "name": config.name,
        "ticker": config.ticker,
        "blocks": state.chain.block_count(),
        "best_hash": best.as_ref().map(|b| b.hash.clone()).unwrap_or_default(),
        "difficulty": best.as_ref().map(|b| b.header.bits).unwrap_or(0),
        "staked_total": state.chain.total_staked(),
        "mempool_size": state.chain.mempool_len(),
        "peers": state.network.peer_count(),
        "total_minted": state.chain.total_minted(),
        "max_supply": config.max_supply,
    }))
}

#[derive(Deserialize)]
pub struct BlockQuery {
    #[serde(default)]
    hash: String,
    height: Option<u64>,
}

/// GET /api/chain/block?hash=... | ?height=...
pub async fn chain_block(
    State(state): State<AppState>,
    Query(query): Query<BlockQuery>,
) -> ApiResult<Json<Value>> {
    let block = if !query.hash.is_empty() {
        state.chain.block_by_hash(&query.hash)?
    } else if let Some(height) = query.height {
        state.chain.block_by_height(height)?
    } else {
        return Err(ApiError::BadRequest(
            "hash or height parameter required".to_string(),
        ));
    };
    match block {
        Some(block) => Ok(ok(block)),
        None => Err(ApiError::NotFound("block not found".to_string())),
    }
}

/// GET /api/chain/mempool
pub async fn chain_mempool(State(state): State<AppState>) -> Json<Value> {
    ok(state.chain.mempool())
}

#[derive(Deserialize)]
pub struct AddressQuery {
    #[serde(default)]
    address: String,
}

/// GET /api/chain/balance?address=...
pub async fn chain_balance(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<Json<Value>> {
    if query.address.is_empty() {
        return Err(ApiError::BadRequest("address parameter required".to_string()));
    }
    let balance = state.chain.balance(&query.address);
    let staked = state.chain.staked_of(&query.address);
    Ok(ok(json!({
        "address": query.address,
        "balance": balance,
        "staked": staked,
        "available": balance - staked,
    })))
}

/// GET /api/chain/transactions?address=...
pub async fn chain_transactions(
    State(state): State<AppState>,
    Query(query): Query<AddressQuery>,
) -> ApiResult<Json<Value>> {
    if query.address.is_empty() {
        return Err(ApiError::BadRequest("address parameter required".to_string()));
    }
    Ok(ok(state.chain.transactions_for(&query.address)?))
}

#[derive(Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    #[serde(default)]
    amount: f64,
    fee: Option<f64>,
    signature: Option<String>,
}

/// POST /api/tx/send
///
/// Accepts a pre-signed transfer; key management lives outside the
/// node.
pub async fn tx_send(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> ApiResult<Json<Value>> {
    if request.from.is_empty() || request.to.is_empty() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "from, to, and amount (>0) required".to_string(),
        ));
    }

    let tx = Transaction::transfer(
        &request.from,
        &request.to,
        request.amount,
        request.fee.unwrap_or(DEFAULT_FEE),
        request.signature,
        now_unix(),
    );
    state.chain.add_to_mempool(tx.clone())?;
    state.network.broadcast_tx(&tx).await;

    Ok(ok(json!({
        "txid": tx.txid,
        "from": tx.from,
        "to": tx.to,
        "amount": tx.amount,
        "fee": tx.fee,
        "status": "pending",
    })))
}

#[derive(Deserialize)]
pub struct StakeRequest {
    #[serde(default)]
    address: String,
    #[serde(default)]
    amount: f64,
}

async fn submit_staking(
    state: &AppState,
    kind: TxKind,
    request: StakeRequest,
) -> ApiResult<Json<Value>> {
    if request.address.is_empty() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest(
            "address and amount (>0) required".to_string(),
        ));
    }
    let tx = Transaction::staking(kind, &request.address, request.amount, now_unix());
    state.chain.add_to_mempool(tx.clone())?;
    state.network.broadcast_tx(&tx).await;
    Ok(ok(json!({ "txid": tx.txid, "status": "pending" })))
}

/// POST /api/tx/stake
pub async fn tx_stake(
    State(state): State<AppState>,
    Json(request): Json<StakeRequest>,
) -> ApiResult<Json<Value>> {
    submit_staking(&state, TxKind::Stake, request).await
}

/// POST /api/tx/unstake
pub async fn tx_unstake(
    State(state): State<AppState>,
    Json(request): Json<StakeRequest>,
) -> ApiResult<Json<Value>> {
    submit_staking(&state, TxKind::Unstake, request).await
}

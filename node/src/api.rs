//! # HTTP + WebSocket API
//!
//! The axum router in front of the local ledger.
//!
//! ## Endpoints
//!
//! | Method | Path      | Description                                 |
//! |--------|-----------|---------------------------------------------|
//! | GET    | `/health` | Liveness probe                              |
//! | GET    | `/status` | Slot, counts and state root                 |
//! | POST   | `/rpc`    | JSON-RPC 2.0 gateway                        |
//! | GET    | `/ws`     | Live `TweetSent` / `TweetDeleted` events    |
//!
//! `/metrics` is served separately on the metrics port.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use tweetslot_contracts::{Ledger, RuntimeError};
use tweetslot_protocol::crypto::{Pubkey, Signature};
use tweetslot_protocol::rpc::{KeyedAccount, LatestBlockhash, RpcError, RpcMethod, RpcRequest, RpcResponse, UiAccount};
use tweetslot_protocol::transaction::Transaction;

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared by every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    pub ledger: Arc<Ledger>,
    pub metrics: SharedMetrics,
}

/// Build the API router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The metrics-port router.
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(crate::metrics::metrics_handler))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// REST handlers
// ---------------------------------------------------------------------------

/// `GET /status` payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub program_id: String,
    pub slot: u64,
    /// Base58.
    pub latest_blockhash: String,
    pub tweets: usize,
    pub accounts: usize,
    pub processed_signatures: usize,
    /// Hex BLAKE3 Merkle root over all accounts.
    pub state_root: String,
    /// RFC 3339.
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `GET /health`: 200 while the process is up.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = &state.ledger;
    let summary = ledger
        .tweet_count()
        .and_then(|tweets| Ok((tweets, ledger.state_root()?)));

    match summary {
        Ok((tweets, root)) => {
            let (blockhash, slot) = ledger.latest_blockhash();
            let db = ledger.db();
            Json(StatusResponse {
                version: state.version.clone(),
                program_id: ledger.program_id().to_string(),
                slot,
                latest_blockhash: LatestBlockhash::new(blockhash, slot).blockhash,
                tweets,
                accounts: db.account_count(),
                processed_signatures: db.signature_count(),
                state_root: hex::encode(root),
                timestamp: chrono::Utc::now().to_rfc3339(),
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "status query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// JSON-RPC
// ---------------------------------------------------------------------------

/// `POST /rpc`.
///
/// The body is parsed by hand so malformed JSON gets a `-32700` response
/// instead of an HTTP rejection.
async fn rpc_handler(State(state): State<AppState>, body: String) -> Json<RpcResponse> {
    let req: RpcRequest = match serde_json::from_str(&body) {
        Ok(req) => req,
        Err(e) => return Json(RpcResponse::error(Value::Null, RpcError::parse_error(e.to_string()))),
    };

    if req.jsonrpc != "2.0" {
        return Json(RpcResponse::error(
            req.id,
            RpcError::invalid_request("jsonrpc must be \"2.0\""),
        ));
    }

    let Some(method) = req.parsed_method() else {
        return Json(RpcResponse::error(req.id, RpcError::method_not_found(req.method)));
    };

    match dispatch(&state, method, &req.params).await {
        Ok(result) => Json(RpcResponse::success(req.id, result)),
        Err(error) => {
            tracing::debug!(method = method.as_str(), code = error.code, "rpc error");
            Json(RpcResponse::error(req.id, error))
        }
    }
}

async fn dispatch(state: &AppState, method: RpcMethod, params: &Value) -> Result<Value, RpcError> {
    let ledger = &state.ledger;
    match method {
        RpcMethod::GetHealth => Ok(json!("ok")),

        RpcMethod::GetLatestBlockhash => {
            let (hash, slot) = ledger.latest_blockhash();
            to_value(LatestBlockhash::new(hash, slot))
        }

        RpcMethod::SendTransaction => {
            let wire: String = param(params, 0)?;
            let tx = Transaction::from_wire(&wire).map_err(|e| RpcError::invalid_params(e.to_string()))?;

            let started = Instant::now();
            let outcome = ledger.process_transaction(&tx).await;
            state
                .metrics
                .commit_latency_seconds
                .observe(started.elapsed().as_secs_f64());

            match outcome {
                Ok(signature) => {
                    state.metrics.transactions_processed_total.inc();
                    Ok(json!(signature.to_string()))
                }
                Err(e) => {
                    state.metrics.transactions_rejected_total.inc();
                    Err(runtime_error(e))
                }
            }
        }

        RpcMethod::GetSignatureStatuses => {
            let raw: Vec<String> = param(params, 0)?;
            let signatures = raw
                .iter()
                .map(|s| s.parse::<Signature>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| RpcError::invalid_params(e.to_string()))?;
            let statuses = ledger.signature_statuses(&signatures).map_err(runtime_error)?;
            to_value(statuses)
        }

        RpcMethod::GetAccountInfo => {
            let address = pubkey_param(params, 0)?;
            let account = ledger.get_account(&address).map_err(runtime_error)?;
            to_value(account.as_ref().map(UiAccount::from))
        }

        RpcMethod::GetProgramAccounts => {
            let program_id = pubkey_param(params, 0)?;
            let accounts = ledger.program_accounts(&program_id).map_err(runtime_error)?;
            let keyed: Vec<KeyedAccount> = accounts
                .iter()
                .map(|(pubkey, account)| KeyedAccount {
                    pubkey: pubkey.to_string(),
                    account: UiAccount::from(account),
                })
                .collect();
            to_value(keyed)
        }

        RpcMethod::RequestAirdrop => {
            let to = pubkey_param(params, 0)?;
            let lamports: u64 = param(params, 1)?;
            let signature = ledger.airdrop(&to, lamports).await.map_err(runtime_error)?;
            state.metrics.airdrops_total.inc();
            Ok(json!(signature.to_string()))
        }

        RpcMethod::GetBalance => {
            let address = pubkey_param(params, 0)?;
            let lamports = ledger.get_balance(&address).map_err(runtime_error)?;
            Ok(json!(lamports))
        }
    }
}

fn param<T: DeserializeOwned>(params: &Value, index: usize) -> Result<T, RpcError> {
    let value = params
        .as_array()
        .and_then(|arr| arr.get(index))
        .ok_or_else(|| RpcError::invalid_params(format!("missing parameter {index}")))?;
    serde_json::from_value(value.clone())
        .map_err(|e| RpcError::invalid_params(format!("parameter {index}: {e}")))
}

fn pubkey_param(params: &Value, index: usize) -> Result<Pubkey, RpcError> {
    let raw: String = param(params, index)?;
    raw.parse()
        .map_err(|e| RpcError::invalid_params(format!("parameter {index}: {e}")))
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(e.to_string()))
}

fn runtime_error(err: RuntimeError) -> RpcError {
    match err {
        RuntimeError::Rejected(e) => RpcError::ledger(&e),
        RuntimeError::Storage(e) => {
            tracing::error!(error = %e, "ledger storage failure");
            RpcError::internal_error(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws`: push-only stream of committed ledger events as JSON.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.ledger.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!(error = %e, "failed to serialize ws event");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "ws subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use tweetslot_contracts::ManualClock;
    use tweetslot_protocol::address::AddressDeriver;
    use tweetslot_protocol::config::{default_program_id, DEFAULT_AIRDROP_LAMPORTS};
    use tweetslot_protocol::crypto::Keypair;
    use tweetslot_protocol::error::ErrorCode;
    use tweetslot_protocol::record::Slot;
    use tweetslot_protocol::transaction::{instruction, sign_transaction, SignatureStatus, TransactionBuilder};

    use crate::metrics::NodeMetrics;

    fn test_app_state() -> AppState {
        let ledger = Ledger::open_temporary(default_program_id(), Arc::new(ManualClock::new(500))).unwrap();
        AppState {
            version: "0.1.0-test".into(),
            ledger: Arc::new(ledger),
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        }
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    async fn post_raw(router: &Router, body: Vec<u8>) -> RpcResponse {
        let req = Request::builder()
            .method("POST")
            .uri("/rpc")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn rpc(router: &Router, method: &str, params: Value) -> RpcResponse {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        post_raw(router, serde_json::to_vec(&body).unwrap()).await
    }

    fn signed_send(state: &AppState, kp: &Keypair, content: &str) -> Transaction {
        let deriver = AddressDeriver::new(default_program_id());
        let message = TransactionBuilder::new()
            .fee_payer(kp.pubkey())
            .recent_blockhash(state.ledger.latest_blockhash().0)
            .instruction(instruction::send_tweet(&deriver, &kp.pubkey(), content).unwrap())
            .build()
            .unwrap();
        sign_transaction(message, kp).unwrap()
    }

    // -- REST ---------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_tweets_and_state_root() {
        let state = test_app_state();
        let kp = Keypair::from_seed(&[1u8; 32]);
        state.ledger.airdrop(&kp.pubkey(), DEFAULT_AIRDROP_LAMPORTS).await.unwrap();
        state
            .ledger
            .process_transaction(&signed_send(&state, &kp, "hi"))
            .await
            .unwrap();

        let expected_root = hex::encode(state.ledger.state_root().unwrap());
        let router = create_router(state);
        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);

        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.tweets, 1);
        assert_eq!(resp.accounts, 2);
        assert_eq!(resp.state_root, expected_root);
        assert_eq!(resp.program_id, default_program_id().to_string());
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_live_tweets() {
        let state = test_app_state();
        let kp = Keypair::from_seed(&[2u8; 32]);
        state.ledger.airdrop(&kp.pubkey(), DEFAULT_AIRDROP_LAMPORTS).await.unwrap();
        state
            .ledger
            .process_transaction(&signed_send(&state, &kp, "counted"))
            .await
            .unwrap();

        let router = create_metrics_router(state);
        let (status, body) = get(&router, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("tweetslot_live_tweets 1"));
    }

    // -- JSON-RPC envelope --------------------------------------------------

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let router = create_router(test_app_state());
        let resp = post_raw(&router, b"{not json".to_vec()).await;
        assert_eq!(resp.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn wrong_version_is_invalid_request() {
        let router = create_router(test_app_state());
        let body = json!({ "jsonrpc": "1.0", "id": 1, "method": "getHealth" });
        let resp = post_raw(&router, serde_json::to_vec(&body).unwrap()).await;
        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn unknown_method_is_not_found() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "getBlock", json!([])).await;
        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn bad_pubkey_is_invalid_params() {
        let router = create_router(test_app_state());
        let resp = rpc(&router, "getBalance", json!(["not-base58!"])).await;
        assert_eq!(resp.error.unwrap().code, -32602);
    }

    // -- JSON-RPC methods ---------------------------------------------------

    #[tokio::test]
    async fn latest_blockhash_matches_ledger() {
        let state = test_app_state();
        let (hash, slot) = state.ledger.latest_blockhash();
        let router = create_router(state);

        let resp = rpc(&router, "getLatestBlockhash", json!([])).await;
        let latest: LatestBlockhash = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(latest.decode(), Some(hash));
        assert_eq!(latest.slot, slot);
    }

    #[tokio::test]
    async fn airdrop_then_balance() {
        let router = create_router(test_app_state());
        let who = Keypair::from_seed(&[3u8; 32]).pubkey().to_string();

        let resp = rpc(&router, "requestAirdrop", json!([who, 1_000])).await;
        assert!(resp.error.is_none());
        let resp = rpc(&router, "getBalance", json!([who])).await;
        assert_eq!(resp.result.unwrap(), json!(1_000));
    }

    #[tokio::test]
    async fn send_transaction_commits_and_is_readable() {
        let state = test_app_state();
        let kp = Keypair::from_seed(&[4u8; 32]);
        state.ledger.airdrop(&kp.pubkey(), DEFAULT_AIRDROP_LAMPORTS).await.unwrap();
        let tx = signed_send(&state, &kp, "over the wire");
        let router = create_router(state);

        let resp = rpc(&router, "sendTransaction", json!([tx.to_wire().unwrap()])).await;
        let signature = resp.result.unwrap();
        assert_eq!(signature, json!(tx.id().unwrap().to_string()));

        let resp = rpc(&router, "getSignatureStatuses", json!([[signature]])).await;
        let statuses: Vec<Option<SignatureStatus>> = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert!(statuses[0].as_ref().unwrap().is_applied());

        let resp = rpc(&router, "getProgramAccounts", json!([default_program_id().to_string()])).await;
        let keyed: Vec<KeyedAccount> = serde_json::from_value(resp.result.unwrap()).unwrap();
        assert_eq!(keyed.len(), 1);

        let address: Pubkey = keyed[0].pubkey.parse().unwrap();
        let resp = rpc(&router, "getAccountInfo", json!([keyed[0].pubkey])).await;
        let ui: UiAccount = serde_json::from_value(resp.result.unwrap()).unwrap();
        let account = tweetslot_protocol::storage::Account::try_from(ui).unwrap();
        let slot = Slot::decode(address, &account.data).unwrap();
        assert_eq!(slot.content, "over the wire");
        assert_eq!(slot.timestamp, 500);
    }

    #[tokio::test]
    async fn rejection_carries_ledger_code() {
        let state = test_app_state();
        let kp = Keypair::from_seed(&[5u8; 32]);
        // Unfunded: rent cannot be paid.
        let tx = signed_send(&state, &kp, "no funds");
        let router = create_router(state);

        let resp = rpc(&router, "sendTransaction", json!([tx.to_wire().unwrap()])).await;
        let error = resp.error.unwrap();
        assert_eq!(error.code, i64::from(ErrorCode::InsufficientFunds.as_u32()));
        assert_eq!(
            error.as_ledger_error().unwrap().kind(),
            Some(ErrorCode::InsufficientFunds)
        );
    }

    #[tokio::test]
    async fn missing_account_is_null() {
        let router = create_router(test_app_state());
        let who = Keypair::from_seed(&[6u8; 32]).pubkey().to_string();
        let resp = rpc(&router, "getAccountInfo", json!([who])).await;
        assert!(resp.error.is_none());
        // `"result": null` reads back as an absent result.
        assert!(resp.result.is_none());
    }
}

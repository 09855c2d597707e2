//! JSON-RPC transport for the collaborator subcommands.
//!
//! [`RpcLedgerClient`] implements `LedgerClient` over HTTP, so the same
//! `TweetClient` that tests drive in-process talks to a remote node here.
//!
//! Error mapping decides what the submitter may retry:
//!
//! - Connection failures, timeouts, non-2xx responses and `-32603` become
//!   `Transport`: the request may or may not have landed.
//! - A positive error code is a ledger rejection and becomes `Rejected`.
//! - Anything unreadable, or another protocol error, becomes `Protocol`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use tweetslot_protocol::client::{ClientError, LedgerClient};
use tweetslot_protocol::config::RPC_REQUEST_TIMEOUT;
use tweetslot_protocol::crypto::{Pubkey, Signature};
use tweetslot_protocol::rpc::{KeyedAccount, LatestBlockhash, RpcMethod, RpcRequest, RpcResponse, UiAccount};
use tweetslot_protocol::storage::Account;
use tweetslot_protocol::transaction::{SignatureStatus, Transaction};

const INTERNAL_ERROR: i64 = -32603;

pub struct RpcLedgerClient {
    http: reqwest::Client,
    url: String,
    request_id: AtomicU64,
}

impl RpcLedgerClient {
    pub fn new(url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(RPC_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            url: url.into(),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<R: DeserializeOwned>(&self, method: RpcMethod, params: Value) -> Result<R, ClientError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(json!(id), method, params);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{}: {e}", method.as_str())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport(format!("{}: HTTP {status}", method.as_str())));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("{}: {e}", method.as_str())))?;

        if let Some(error) = body.error {
            if let Some(rejection) = error.as_ledger_error() {
                return Err(ClientError::Rejected(rejection));
            }
            let reason = format!("{}: rpc error {}: {}", method.as_str(), error.code, error.message);
            return Err(if error.code == INTERNAL_ERROR {
                ClientError::Transport(reason)
            } else {
                ClientError::Protocol(reason)
            });
        }

        // A `null` result arrives as an absent one.
        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| ClientError::Protocol(format!("{}: {e}", method.as_str())))
    }
}

fn parse<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, ClientError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ClientError::Protocol(format!("bad {what} {raw:?}: {e}")))
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn latest_blockhash(&self) -> Result<([u8; 32], u64), ClientError> {
        let latest: LatestBlockhash = self.call(RpcMethod::GetLatestBlockhash, json!([])).await?;
        let hash = latest
            .decode()
            .ok_or_else(|| ClientError::Protocol(format!("bad blockhash {:?}", latest.blockhash)))?;
        Ok((hash, latest.slot))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError> {
        let wire = tx
            .to_wire()
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        let raw: String = self.call(RpcMethod::SendTransaction, json!([wire])).await?;
        parse(&raw, "signature")
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, ClientError> {
        let encoded: Vec<String> = signatures.iter().map(ToString::to_string).collect();
        self.call(RpcMethod::GetSignatureStatuses, json!([encoded])).await
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, ClientError> {
        let ui: Option<UiAccount> = self
            .call(RpcMethod::GetAccountInfo, json!([address.to_string()]))
            .await?;
        ui.map(Account::try_from)
            .transpose()
            .map_err(ClientError::Protocol)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, ClientError> {
        let keyed: Vec<KeyedAccount> = self
            .call(RpcMethod::GetProgramAccounts, json!([program_id.to_string()]))
            .await?;
        keyed
            .into_iter()
            .map(|entry| {
                let pubkey = parse(&entry.pubkey, "pubkey")?;
                let account = Account::try_from(entry.account).map_err(ClientError::Protocol)?;
                Ok((pubkey, account))
            })
            .collect()
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        let raw: String = self
            .call(RpcMethod::RequestAirdrop, json!([to.to_string(), lamports]))
            .await?;
        parse(&raw, "signature")
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        self.call(RpcMethod::GetBalance, json!([address.to_string()])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tweetslot_contracts::{Ledger, ManualClock};
    use tweetslot_protocol::client::SubmitterConfig;
    use tweetslot_protocol::config::{default_program_id, Cluster, DEFAULT_AIRDROP_LAMPORTS};
    use tweetslot_protocol::crypto::Keypair;
    use tweetslot_protocol::error::SlotError;
    use tweetslot_protocol::{Session, TweetClient};

    use crate::api::{create_router, AppState};
    use crate::metrics::NodeMetrics;

    /// Serve a fresh ledger on an ephemeral port and return its RPC URL.
    async fn spawn_node() -> String {
        let ledger = Ledger::open_temporary(default_program_id(), Arc::new(ManualClock::new(77))).unwrap();
        let state = AppState {
            version: "test".into(),
            ledger: Arc::new(ledger),
            metrics: Arc::new(NodeMetrics::new().unwrap()),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}/rpc")
    }

    #[tokio::test]
    async fn send_fetch_delete_over_http() {
        let url = spawn_node().await;
        let client = TweetClient::new(Arc::new(RpcLedgerClient::new(&url)), SubmitterConfig::default());
        let session = Session::new(Keypair::from_seed(&[1u8; 32]), Cluster::Custom(url));

        client
            .airdrop(&session.author(), DEFAULT_AIRDROP_LAMPORTS)
            .await
            .unwrap();
        let address = client.send(&session, "hello over http").await.unwrap();

        let slot = client.fetch(&session, &address).await.unwrap();
        assert_eq!(slot.content, "hello over http");
        assert_eq!(slot.timestamp, 77);
        assert_eq!(client.fetch_all(&session).await.unwrap().len(), 1);

        assert_eq!(client.send(&session, "again").await, Err(SlotError::AlreadyOccupied));

        client.delete(&session).await.unwrap();
        assert_eq!(client.fetch(&session, &address).await, Err(SlotError::NotFound));
    }

    #[tokio::test]
    async fn unreachable_node_is_transient() {
        // Nothing listens on port 9 locally.
        let rpc = RpcLedgerClient::new("http://127.0.0.1:9/rpc");
        let err = rpc.get_balance(&Pubkey::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
        assert!(SlotError::from(err).is_transient());
    }
}

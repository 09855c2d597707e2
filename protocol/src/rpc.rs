//! # JSON-RPC API Definitions
//!
//! Request/response types shared by the node's `/rpc` handler and the
//! client's HTTP transport. The server itself lives in the node binary.
//!
//! ## Method Index
//!
//! | Method                 | Params                   | Result                          |
//! |------------------------|--------------------------|---------------------------------|
//! | `getHealth`            | none                     | `"ok"`                          |
//! | `getLatestBlockhash`   | none                     | [`LatestBlockhash`]             |
//! | `sendTransaction`      | `[hex(bincode(tx))]`     | signature, base58               |
//! | `getSignatureStatuses` | `[[sig, …]]`             | `[SignatureStatus \| null, …]`  |
//! | `getAccountInfo`       | `[address]`              | [`UiAccount`] or `null`         |
//! | `getProgramAccounts`   | `[program_id]`           | `[KeyedAccount, …]`             |
//! | `requestAirdrop`       | `[pubkey, lamports]`     | signature, base58               |
//! | `getBalance`           | `[pubkey]`               | lamports                        |
//!
//! Ledger rejections come back as error objects whose `code` is the
//! positive ledger code from [`crate::error`]. Negative codes are the
//! standard JSON-RPC protocol errors.

use serde::{Deserialize, Serialize};

use crate::crypto::keys::Pubkey;
use crate::error::LedgerError;
use crate::storage::Account;

// ---------------------------------------------------------------------------
// RPC Method Enumeration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    #[serde(rename = "getHealth")]
    GetHealth,
    #[serde(rename = "getLatestBlockhash")]
    GetLatestBlockhash,
    #[serde(rename = "sendTransaction")]
    SendTransaction,
    #[serde(rename = "getSignatureStatuses")]
    GetSignatureStatuses,
    #[serde(rename = "getAccountInfo")]
    GetAccountInfo,
    #[serde(rename = "getProgramAccounts")]
    GetProgramAccounts,
    #[serde(rename = "requestAirdrop")]
    RequestAirdrop,
    #[serde(rename = "getBalance")]
    GetBalance,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::GetHealth => "getHealth",
            RpcMethod::GetLatestBlockhash => "getLatestBlockhash",
            RpcMethod::SendTransaction => "sendTransaction",
            RpcMethod::GetSignatureStatuses => "getSignatureStatuses",
            RpcMethod::GetAccountInfo => "getAccountInfo",
            RpcMethod::GetProgramAccounts => "getProgramAccounts",
            RpcMethod::RequestAirdrop => "requestAirdrop",
            RpcMethod::GetBalance => "getBalance",
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Request / Response
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
///
/// `method` is kept as a string so an unknown method can be answered with
/// `-32601` instead of failing to parse the whole body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RpcRequest {
    pub fn new(id: serde_json::Value, method: RpcMethod, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.as_str().to_string(),
            params,
        }
    }

    pub fn parsed_method(&self) -> Option<RpcMethod> {
        serde_json::from_value(serde_json::Value::String(self.method.clone())).ok()
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result` or `error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Errors
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 error object.
///
/// - `-32700`: Parse error
/// - `-32600`: Invalid request
/// - `-32601`: Method not found
/// - `-32602`: Invalid params
/// - `-32603`: Internal error
/// - `6000..`: ledger rejection, see [`crate::error::ErrorCode`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::with_code(-32700, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::with_code(-32600, msg)
    }

    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::with_code(-32601, format!("method not found: {}", method.into()))
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::with_code(-32602, msg)
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::with_code(-32603, msg)
    }

    pub fn ledger(err: &LedgerError) -> Self {
        Self::with_code(i64::from(err.code), err.message.clone())
    }

    /// `Some` when this error is a ledger rejection rather than a protocol
    /// failure.
    pub fn as_ledger_error(&self) -> Option<LedgerError> {
        u32::try_from(self.code).ok().map(|code| LedgerError {
            code,
            message: self.message.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Typed Response Payloads
// ---------------------------------------------------------------------------

/// `getLatestBlockhash` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestBlockhash {
    /// Base58.
    pub blockhash: String,
    pub slot: u64,
}

impl LatestBlockhash {
    pub fn new(blockhash: [u8; 32], slot: u64) -> Self {
        Self {
            blockhash: bs58::encode(blockhash).into_string(),
            slot,
        }
    }

    pub fn decode(&self) -> Option<[u8; 32]> {
        let bytes = bs58::decode(&self.blockhash).into_vec().ok()?;
        bytes.try_into().ok()
    }
}

/// JSON form of an [`Account`]: owner in base58, data in hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiAccount {
    pub lamports: u64,
    pub owner: String,
    pub data: String,
}

impl From<&Account> for UiAccount {
    fn from(account: &Account) -> Self {
        Self {
            lamports: account.lamports,
            owner: account.owner.to_string(),
            data: hex::encode(&account.data),
        }
    }
}

impl TryFrom<UiAccount> for Account {
    type Error = String;

    fn try_from(ui: UiAccount) -> Result<Self, Self::Error> {
        let owner: Pubkey = ui.owner.parse().map_err(|e| format!("bad owner: {e}"))?;
        let data = hex::decode(&ui.data).map_err(|e| format!("bad data: {e}"))?;
        Ok(Account::new(ui.lamports, owner, data))
    }
}

/// `getProgramAccounts` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedAccount {
    pub pubkey: String,
    pub account: UiAccount,
}

//! # Storage Module
//!
//! Account model and the sled-backed persistence layer of the local ledger.
//!
//! ```text
//! account.rs: Account { lamports, owner, data } and its state-root leaf
//! db.rs     : LedgerDb: accounts, processed signatures, ledger tip
//! ```
//!
//! Bincode is the on-disk encoding. JSON is for the RPC surface only.

pub mod account;
pub mod db;

pub use account::Account;
pub use db::{CommitBatch, DbError, LedgerDb, LedgerTip};

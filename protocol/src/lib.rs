// Copyright (c) 2026 TweetSlot Contributors. MIT License.
// See LICENSE for details.

//! # TweetSlot Protocol: Core Library
//!
//! One short post per author, stored at an address derived from the
//! author's public key. Creating a post claims the slot, deleting it frees
//! the slot again, and nobody else can write there.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys and signatures, SHA-256 and BLAKE3.
//! - **address**: Program-derived slot addresses and their verification.
//! - **validation**: The content rule, shared by client and program.
//! - **record**: Byte layout of a slot record and the typed [`record::Slot`].
//! - **error**: Stable ledger error codes and [`error::SlotError`].
//! - **transaction**: Instruction codec, message building, signing, verification.
//! - **storage**: Ledger accounts and the sled-backed [`storage::LedgerDb`].
//! - **rpc**: JSON-RPC types shared by node and client.
//! - **client**: Submitter, feed aggregator and the [`client::TweetClient`] facade.
//! - **config**: Protocol constants and the [`config::Cluster`] selector.
//!
//! ## Write path
//!
//! ```text
//! validate_content ─► AddressDeriver ─► send_tweet ix ─► TransactionSubmitter ─► ledger
//! ```
//!
//! ## Read path
//!
//! ```text
//! FeedAggregator ─► getProgramAccounts ─► decode ─► verify address ─► sort ─► FeedSnapshot
//! ```

pub mod address;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod record;
pub mod rpc;
pub mod storage;
pub mod transaction;
pub mod validation;

pub use address::AddressDeriver;
pub use client::{LedgerClient, Session, TweetClient};
pub use crypto::{Keypair, Pubkey, Signature};
pub use error::{ErrorCode, LedgerError, SlotError};
pub use record::{Slot, TweetRecord};

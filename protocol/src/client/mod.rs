//! # Client
//!
//! Everything a collaborator needs to write and read slots against a ledger
//! it reaches over some transport.
//!
//! ```text
//! session.rs  : Session: signing key + program id + cluster
//! submitter.rs: TransactionSubmitter: build, sign, submit, confirm
//! feed.rs     : FeedAggregator: scan, verify, sort, publish
//! ```
//!
//! The transport is the [`LedgerClient`] trait. The node crate implements it
//! over JSON-RPC; the contracts crate implements it directly on its
//! in-process ledger runtime.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod feed;
pub mod session;
pub mod submitter;

#[cfg(test)]
pub(crate) mod mock;

pub use feed::{FeedAggregator, FeedError, FeedSnapshot, FeedState};
pub use session::Session;
pub use submitter::{SubmitError, SubmitterConfig, TransactionSubmitter};

use crate::address::AddressDeriver;
use crate::crypto::keys::{Pubkey, Signature};
use crate::error::{LedgerError, SlotError};
use crate::record::Slot;
use crate::storage::Account;
use crate::transaction::{instruction, SignatureStatus, Transaction};
use crate::validation::validate_content;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Failure talking to a ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The ledger processed the request and said no. Definitive.
    #[error("rejected: {0}")]
    Rejected(LedgerError),

    /// The request may or may not have reached the ledger.
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger answered with something this client cannot read.
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl From<ClientError> for SlotError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(e) => e.classify(),
            ClientError::Transport(reason) | ClientError::Protocol(reason) => {
                SlotError::transient(reason)
            }
        }
    }
}

/// The ledger operations the client depends on.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Most recent blockhash and the slot it was produced in.
    async fn latest_blockhash(&self) -> Result<([u8; 32], u64), ClientError>;

    /// Submit a signed transaction. `Ok` means the ledger applied it.
    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError>;

    /// Status per signature, `None` for signatures the ledger has not seen.
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, ClientError>;

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, ClientError>;

    /// All accounts owned by `program_id`. Unordered.
    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, ClientError>;

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, ClientError>;

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError>;
}

// ---------------------------------------------------------------------------
// TweetClient
// ---------------------------------------------------------------------------

/// The collaborator facade: send, delete and read slots.
pub struct TweetClient {
    ledger: Arc<dyn LedgerClient>,
    submitter: TransactionSubmitter,
}

impl TweetClient {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: SubmitterConfig) -> Self {
        let submitter = TransactionSubmitter::new(Arc::clone(&ledger), config);
        Self { ledger, submitter }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    /// Publish `content` into the session author's slot. Returns the slot
    /// address once the ledger has durably committed it.
    ///
    /// Over-long content fails locally and is never sent.
    pub async fn send(&self, session: &Session, content: &str) -> Result<Pubkey, SlotError> {
        validate_content(content)?;

        let deriver = session.deriver();
        let author = session.author();
        let (address, _) = deriver
            .tweet_address(&author)
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;
        let ix = instruction::send_tweet(&deriver, &author, content)
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;

        let signature = self.submitter.submit(session, ix).await?;
        info!(%address, %signature, "tweet sent");
        Ok(address)
    }

    /// Delete the session author's slot and reclaim its rent.
    pub async fn delete(&self, session: &Session) -> Result<(), SlotError> {
        let deriver = session.deriver();
        let ix = instruction::delete_tweet(&deriver, &session.author())
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;

        let signature = self.submitter.submit(session, ix).await?;
        info!(author = %session.author(), %signature, "tweet deleted");
        Ok(())
    }

    /// Every live slot under the session's program, newest first.
    pub async fn fetch_all(&self, session: &Session) -> Result<Vec<Slot>, SlotError> {
        let slots = feed::scan(self.ledger.as_ref(), &session.deriver())
            .await
            .map_err(SlotError::from)?;
        Ok(slots)
    }

    /// The slot at `address`.
    pub async fn fetch(&self, session: &Session, address: &Pubkey) -> Result<Slot, SlotError> {
        let account = self
            .ledger
            .get_account(address)
            .await?
            .ok_or(SlotError::NotFound)?;
        if !account.is_owned_by(session.deriver().program_id()) {
            return Err(SlotError::NotFound);
        }
        Slot::decode(*address, &account.data).map_err(|e| {
            warn!(%address, error = %e, "malformed record");
            SlotError::NotFound
        })
    }

    /// The live slot of `author`, located by deriving its address.
    pub async fn fetch_by_author(&self, session: &Session, author: &Pubkey) -> Result<Slot, SlotError> {
        let deriver = session.deriver();
        let (address, _) = deriver
            .tweet_address(author)
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;
        let slot = self.fetch(session, &address).await?;
        if slot.author != *author {
            warn!(%address, "record author does not match derived owner");
            return Err(SlotError::NotFound);
        }
        Ok(slot)
    }

    pub async fn balance(&self, address: &Pubkey) -> Result<u64, SlotError> {
        Ok(self.ledger.get_balance(address).await?)
    }

    pub async fn airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, SlotError> {
        Ok(self.ledger.request_airdrop(to, lamports).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockLedger, SendBehavior};
    use super::*;
    use crate::config::{default_program_id, Cluster};
    use crate::crypto::keys::Keypair;
    use crate::record::TweetRecord;

    fn session() -> Session {
        Session::new(Keypair::from_seed(&[1u8; 32]), Cluster::Localnet)
    }

    #[tokio::test]
    async fn over_long_content_is_never_sent() {
        let ledger = Arc::new(MockLedger::new());
        let client = TweetClient::new(ledger.clone(), SubmitterConfig::default());

        let err = client.send(&session(), &"x".repeat(251)).await.unwrap_err();
        assert!(matches!(err, SlotError::ContentTooLong { length: 251, .. }));
        assert_eq!(ledger.send_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_send_reports_the_request_signature() {
        let ledger = Arc::new(MockLedger::new());
        for _ in 0..32 {
            ledger.script_send(SendBehavior::Drop);
        }
        let client = TweetClient::new(ledger.clone(), SubmitterConfig::default());

        let err = client.send(&session(), "lost in transit").await.unwrap_err();
        assert!(err.is_transient());
        let signature = err.signature().expect("sent request is identified");
        assert!(ledger.sent_signatures().contains(signature));
        assert_eq!(ledger.status(signature), None);
    }

    #[tokio::test]
    async fn fetch_by_author_finds_derived_slot() {
        let session = session();
        let author = session.author();
        let (address, _) = session.deriver().tweet_address(&author).unwrap();
        let record = TweetRecord {
            author,
            content: "hello".into(),
            timestamp: 10,
        };

        let ledger = Arc::new(MockLedger::new());
        ledger.put_account(
            address,
            Account::new(1, default_program_id(), record.encode().unwrap()),
        );
        let client = TweetClient::new(ledger, SubmitterConfig::default());

        let slot = client.fetch_by_author(&session, &author).await.unwrap();
        assert_eq!(slot.address, address);
        assert_eq!(slot.content, "hello");
    }

    #[tokio::test]
    async fn fetch_missing_slot_is_not_found() {
        let session = session();
        let client = TweetClient::new(Arc::new(MockLedger::new()), SubmitterConfig::default());
        assert_eq!(
            client.fetch_by_author(&session, &session.author()).await,
            Err(SlotError::NotFound)
        );
    }

    #[tokio::test]
    async fn fetch_rejects_foreign_owner() {
        let session = session();
        let author = session.author();
        let (address, _) = session.deriver().tweet_address(&author).unwrap();
        let record = TweetRecord {
            author,
            content: "spoof".into(),
            timestamp: 1,
        };
        let ledger = Arc::new(MockLedger::new());
        ledger.put_account(
            address,
            Account::new(1, Pubkey::new_from_array([9u8; 32]), record.encode().unwrap()),
        );
        let client = TweetClient::new(ledger, SubmitterConfig::default());

        assert_eq!(client.fetch(&session, &address).await, Err(SlotError::NotFound));
    }

    #[test]
    fn transport_errors_are_transient() {
        let err: SlotError = ClientError::Transport("connection reset".into()).into();
        assert!(err.is_transient());
    }
}

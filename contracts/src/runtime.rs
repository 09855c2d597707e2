//! # Ledger Runtime
//!
//! A single-node ledger that executes tweet transactions against
//! [`LedgerDb`].
//!
//! ## Write path
//!
//! Every write (transactions, airdrops, slot advances) runs under one
//! `tokio::sync::Mutex`. Commit order is lock order, which is what decides
//! a race between two creates for the same slot: the first commits, the
//! second executes against the committed state and fails `AlreadyOccupied`.
//!
//! ```text
//! lock ─► dedupe ─► verify ─► blockhash window ─► execute ─► commit ─► event
//! ```
//!
//! Verification and blockhash failures are not recorded: the transaction
//! never executed, and the client is free to re-sign. Program failures are
//! recorded as failed statuses with no account changes, so a resubmitted
//! signature returns the same outcome without running again.
//!
//! Reads never take the lock. Statuses from the recent-blockhash window are
//! cached in memory; older ones are read back from sled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tweetslot_protocol::client::{ClientError, LedgerClient};
use tweetslot_protocol::config::MAX_RECENT_BLOCKHASHES;
use tweetslot_protocol::crypto::{hashv, sha256, Pubkey, Signature};
use tweetslot_protocol::error::{ErrorCode, LedgerError};
use tweetslot_protocol::storage::{Account, CommitBatch, DbError, LedgerDb, LedgerTip};
use tweetslot_protocol::transaction::{verify_transaction, SignatureStatus, Transaction, TransactionError};

use crate::accounts::WorkingSet;
use crate::program::{ProgramEffect, TweetProgram};
use crate::store::{SlotStore, StoreError};

const GENESIS_TAG: &[u8] = b"tweetslot:genesis";

/// Capacity of the event channel. Slow subscribers lag and skip events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the unix timestamp stamped into new records.
pub trait Clock: Send + Sync {
    fn unix_timestamp(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_timestamp(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn unix_timestamp(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Errors and events
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Definitive rejection, carried to the client as-is.
    #[error(transparent)]
    Rejected(LedgerError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl RuntimeError {
    fn rejected(code: ErrorCode, message: impl Into<String>) -> Self {
        RuntimeError::Rejected(LedgerError::new(code, message))
    }
}

impl From<TransactionError> for RuntimeError {
    fn from(err: TransactionError) -> Self {
        RuntimeError::Rejected(err.to_ledger_error())
    }
}

impl From<RuntimeError> for ClientError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Rejected(e) => ClientError::Rejected(e),
            RuntimeError::Storage(e) => ClientError::Transport(e.to_string()),
        }
    }
}

/// A committed program effect, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub slot: u64,
    pub signature: Signature,
    #[serde(flatten)]
    pub effect: ProgramEffect,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

struct TipState {
    slot: u64,
    blockhashes: VecDeque<[u8; 32]>,
}

impl TipState {
    fn to_tip(&self) -> LedgerTip {
        LedgerTip {
            slot: self.slot,
            blockhashes: self.blockhashes.iter().copied().collect(),
        }
    }

    fn latest(&self) -> [u8; 32] {
        self.blockhashes.back().copied().unwrap_or_default()
    }
}

fn is_recent(status_slot: u64, current_slot: u64) -> bool {
    current_slot.saturating_sub(status_slot) < MAX_RECENT_BLOCKHASHES as u64
}

pub struct Ledger {
    db: LedgerDb,
    program: TweetProgram,
    clock: Arc<dyn Clock>,
    writer: Mutex<TipState>,
    /// `(blockhash, slot)` readable without the writer lock.
    latest: RwLock<([u8; 32], u64)>,
    /// Statuses processed within the last `MAX_RECENT_BLOCKHASHES` slots.
    statuses: DashMap<Signature, SignatureStatus>,
    events: broadcast::Sender<LedgerEvent>,
}

impl Ledger {
    /// Open a ledger over `db`, creating the genesis tip if there is none.
    pub fn open(db: LedgerDb, program_id: Pubkey, clock: Arc<dyn Clock>) -> Result<Self, RuntimeError> {
        let tip = match db.get_tip()? {
            Some(tip) if !tip.blockhashes.is_empty() => tip,
            _ => {
                let genesis = LedgerTip {
                    slot: 0,
                    blockhashes: vec![hashv(&[GENESIS_TAG, program_id.as_bytes()])],
                };
                db.put_tip(&genesis)?;
                info!(program = %program_id, "genesis tip created");
                genesis
            }
        };

        let state = TipState {
            slot: tip.slot,
            blockhashes: tip.blockhashes.into_iter().collect(),
        };
        let latest = RwLock::new((state.latest(), state.slot));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(slot = state.slot, accounts = db.account_count(), "ledger opened");
        Ok(Self {
            db,
            program: TweetProgram::new(program_id),
            clock,
            writer: Mutex::new(state),
            latest,
            statuses: DashMap::new(),
            events,
        })
    }

    /// Ledger over a throwaway in-memory database.
    pub fn open_temporary(program_id: Pubkey, clock: Arc<dyn Clock>) -> Result<Self, RuntimeError> {
        Self::open(LedgerDb::open_temporary()?, program_id, clock)
    }

    pub fn program_id(&self) -> &Pubkey {
        self.program.program_id()
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.events.subscribe()
    }

    // -- Slots --------------------------------------------------------------

    /// Produce the next slot and its blockhash. The oldest blockhash falls
    /// out of the window once it holds more than the maximum.
    pub async fn advance_slot(&self) -> Result<u64, RuntimeError> {
        let mut tip = self.writer.lock().await;
        let slot = tip.slot + 1;
        let blockhash = hashv(&[&tip.latest(), &slot.to_le_bytes()]);

        let mut next = TipState {
            slot,
            blockhashes: tip.blockhashes.clone(),
        };
        next.blockhashes.push_back(blockhash);
        while next.blockhashes.len() > MAX_RECENT_BLOCKHASHES {
            next.blockhashes.pop_front();
        }

        self.db.put_tip(&next.to_tip())?;
        *tip = next;
        *self.latest.write() = (blockhash, slot);
        self.statuses.retain(|_, status| is_recent(status.slot, slot));
        debug!(slot, "slot advanced");
        Ok(slot)
    }

    /// Advance one slot every `interval` until the returned handle is aborted.
    pub fn spawn_slot_ticker(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = ledger.advance_slot().await {
                    warn!(error = %e, "slot advance failed");
                }
            }
        })
    }

    // -- Writes -------------------------------------------------------------

    /// Execute a signed transaction. `Ok` means it was committed.
    pub async fn process_transaction(&self, tx: &Transaction) -> Result<Signature, RuntimeError> {
        let signature = tx
            .id()
            .cloned()
            .ok_or(TransactionError::MissingSignature)?;

        let tip = self.writer.lock().await;

        if let Some(status) = self.signature_status(&signature)? {
            debug!(%signature, "duplicate signature");
            return Self::outcome(signature, status);
        }

        verify_transaction(tx).map_err(|e| {
            warn!(%signature, error = %e, "transaction failed verification");
            RuntimeError::from(e)
        })?;

        if !tip.blockhashes.contains(&tx.message.recent_blockhash) {
            return Err(RuntimeError::rejected(
                ErrorCode::BlockhashNotFound,
                ErrorCode::BlockhashNotFound.message(),
            ));
        }

        let now = self.clock.unix_timestamp();
        let mut store = SlotStore::new(WorkingSet::new(&self.db), self.program.deriver());
        let executed = self
            .program
            .process(&mut store, &tx.message.instruction, &tx.message.fee_payer, now);

        match executed {
            Ok(effect) => {
                let status = SignatureStatus::applied(tip.slot);
                self.db.commit(&CommitBatch {
                    accounts: store.into_changes(),
                    signature: Some((signature.clone(), status.clone())),
                    tip: None,
                })?;
                self.statuses.insert(signature.clone(), status);

                info!(%signature, slot = tip.slot, "transaction committed");
                // No subscribers is fine.
                let _ = self.events.send(LedgerEvent {
                    slot: tip.slot,
                    signature: signature.clone(),
                    effect,
                });
                Ok(signature)
            }
            Err(StoreError::Slot(e)) => {
                let err = e.to_ledger_error().unwrap_or_else(|| {
                    LedgerError::new(ErrorCode::InvalidInstruction, e.to_string())
                });
                let status = SignatureStatus::failed(tip.slot, err.clone());
                self.db.commit(&CommitBatch {
                    signature: Some((signature.clone(), status.clone())),
                    ..Default::default()
                })?;
                self.statuses.insert(signature.clone(), status);

                info!(%signature, code = err.code, "transaction failed");
                Err(RuntimeError::Rejected(err))
            }
            Err(StoreError::Db(e)) => Err(e.into()),
        }
    }

    /// Credit `lamports` to `to`. Recorded under a synthesized signature.
    pub async fn airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, RuntimeError> {
        let tip = self.writer.lock().await;

        let mut account = self.db.get_account(to)?.unwrap_or_default();
        account.lamports = account.lamports.checked_add(lamports).ok_or_else(|| {
            RuntimeError::rejected(ErrorCode::InvalidInstruction, "lamport overflow")
        })?;

        let nonce = self.db.signature_count() as u64;
        let first = hashv(&[
            b"airdrop",
            to.as_bytes(),
            &lamports.to_le_bytes(),
            &tip.slot.to_le_bytes(),
            &nonce.to_le_bytes(),
        ]);
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&first);
        bytes[32..].copy_from_slice(&sha256(&first));
        let signature = Signature::from_bytes(bytes);

        let status = SignatureStatus::applied(tip.slot);
        self.db.commit(&CommitBatch {
            accounts: vec![(*to, Some(account))],
            signature: Some((signature.clone(), status.clone())),
            tip: None,
        })?;
        self.statuses.insert(signature.clone(), status);

        info!(%to, lamports, "airdrop");
        Ok(signature)
    }

    fn outcome(signature: Signature, status: SignatureStatus) -> Result<Signature, RuntimeError> {
        match status.err {
            None => Ok(signature),
            Some(err) => Err(RuntimeError::Rejected(err)),
        }
    }

    // -- Reads --------------------------------------------------------------

    pub fn latest_blockhash(&self) -> ([u8; 32], u64) {
        *self.latest.read()
    }

    pub fn slot(&self) -> u64 {
        self.latest.read().1
    }

    pub fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureStatus>, RuntimeError> {
        if let Some(status) = self.statuses.get(signature) {
            return Ok(Some(status.clone()));
        }
        let stored = self.db.get_signature_status(signature)?;
        if let Some(status) = stored.as_ref().filter(|s| is_recent(s.slot, self.slot())) {
            self.statuses.insert(signature.clone(), status.clone());
        }
        Ok(stored)
    }

    pub fn signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, RuntimeError> {
        signatures.iter().map(|s| self.signature_status(s)).collect()
    }

    pub fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, RuntimeError> {
        Ok(self.db.get_account(address)?)
    }

    pub fn get_balance(&self, address: &Pubkey) -> Result<u64, RuntimeError> {
        Ok(self.db.get_balance(address)?)
    }

    pub fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<(Pubkey, Account)>, RuntimeError> {
        Ok(self.db.program_accounts(program_id)?)
    }

    /// Number of occupied slots.
    pub fn tweet_count(&self) -> Result<usize, RuntimeError> {
        Ok(self.db.program_accounts(self.program_id())?.len())
    }

    /// BLAKE3 Merkle root over every account.
    pub fn state_root(&self) -> Result<[u8; 32], RuntimeError> {
        Ok(self.db.state_root()?)
    }
}

#[async_trait]
impl LedgerClient for Ledger {
    async fn latest_blockhash(&self) -> Result<([u8; 32], u64), ClientError> {
        Ok(Ledger::latest_blockhash(self))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError> {
        Ok(self.process_transaction(tx).await?)
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, ClientError> {
        Ok(self.signature_statuses(signatures)?)
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, ClientError> {
        Ok(Ledger::get_account(self, address)?)
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, ClientError> {
        Ok(self.program_accounts(program_id)?)
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        Ok(self.airdrop(to, lamports).await?)
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        Ok(Ledger::get_balance(self, address)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # LedgerDb: Persistent Account Storage
//!
//! The persistence layer of the local ledger, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree         | Key                    | Value                     |
//! |--------------|------------------------|---------------------------|
//! | `accounts`   | `address` (32B)        | `bincode(Account)`        |
//! | `signatures` | `signature` (64B)      | `bincode(SignatureStatus)`|
//! | `metadata`   | key (UTF-8)            | value (bytes)             |
//!
//! ## Atomicity
//!
//! A processed transaction touches up to three trees: the accounts it
//! changed, its signature status, and the ledger tip. [`LedgerDb::commit`]
//! writes all of them in one sled transaction, so a crash either leaves the
//! transaction fully applied (and its signature recorded) or not at all.

use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

use super::account::Account;
use crate::crypto::hash::merkle_root;
use crate::crypto::keys::{Pubkey, Signature};
use crate::transaction::status::SignatureStatus;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt key in tree {0}")]
    CorruptKey(&'static str),
}

pub type DbResult<T> = Result<T, DbError>;

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

const META_TIP: &[u8] = b"ledger_tip";

/// Current slot plus the recent blockhash window, newest last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTip {
    pub slot: u64,
    pub blockhashes: Vec<[u8; 32]>,
}

impl LedgerTip {
    pub fn latest_blockhash(&self) -> Option<[u8; 32]> {
        self.blockhashes.last().copied()
    }
}

/// Everything one processed transaction writes.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    /// `None` removes the account.
    pub accounts: Vec<(Pubkey, Option<Account>)>,
    pub signature: Option<(Signature, SignatureStatus)>,
    pub tip: Option<LedgerTip>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.signature.is_none() && self.tip.is_none()
    }
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent storage for ledger accounts and processed signatures.
///
/// sled trees support lock-free concurrent reads, so `LedgerDb` is cheap to
/// clone and share. Write ordering is the runtime's job.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    accounts: Tree,
    signatures: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database, removed on drop.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let signatures = db.open_tree("signatures")?;
        let metadata = db.open_tree("metadata")?;

        Ok(Self {
            db,
            accounts,
            signatures,
            metadata,
        })
    }

    // -- Accounts -----------------------------------------------------------

    pub fn get_account(&self, address: &Pubkey) -> DbResult<Option<Account>> {
        match self.accounts.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Lamport balance; zero for unknown addresses.
    pub fn get_balance(&self, address: &Pubkey) -> DbResult<u64> {
        Ok(self
            .get_account(address)?
            .map(|a| a.lamports)
            .unwrap_or(0))
    }

    /// Every account owned by `program_id`, in address order.
    pub fn program_accounts(&self, program_id: &Pubkey) -> DbResult<Vec<(Pubkey, Account)>> {
        let mut out = Vec::new();
        for entry in self.accounts.iter() {
            let (key, value) = entry?;
            let account: Account = decode(&value)?;
            if account.is_owned_by(program_id) {
                let address =
                    Pubkey::try_from_slice(&key).map_err(|_| DbError::CorruptKey("accounts"))?;
                out.push((address, account));
            }
        }
        Ok(out)
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // -- Signatures ---------------------------------------------------------

    pub fn get_signature_status(&self, signature: &Signature) -> DbResult<Option<SignatureStatus>> {
        match self.signatures.get(signature.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    // -- Tip ----------------------------------------------------------------

    pub fn get_tip(&self) -> DbResult<Option<LedgerTip>> {
        match self.metadata.get(META_TIP)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_tip(&self, tip: &LedgerTip) -> DbResult<()> {
        self.metadata.insert(META_TIP, encode(tip)?)?;
        Ok(())
    }

    // -- Commit -------------------------------------------------------------

    /// Apply a batch atomically across all trees, then flush.
    pub fn commit(&self, batch: &CommitBatch) -> DbResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        // Serialize outside the transaction closure, which sled may re-run.
        let account_writes: Vec<([u8; 32], Option<Vec<u8>>)> = batch
            .accounts
            .iter()
            .map(|(address, account)| -> DbResult<([u8; 32], Option<Vec<u8>>)> {
                let value = account.as_ref().map(encode).transpose()?;
                Ok((address.to_bytes(), value))
            })
            .collect::<DbResult<_>>()?;
        let signature_write = batch
            .signature
            .as_ref()
            .map(|(sig, status)| Ok::<_, DbError>((sig.as_bytes().to_vec(), encode(status)?)))
            .transpose()?;
        let tip_write = batch.tip.as_ref().map(encode).transpose()?;

        let result: Result<(), TransactionError<()>> =
            (&self.accounts, &self.signatures, &self.metadata).transaction(
                |(accounts, signatures, metadata)| {
                    for (key, value) in &account_writes {
                        match value {
                            Some(bytes) => {
                                accounts.insert(&key[..], bytes.as_slice())?;
                            }
                            None => {
                                accounts.remove(&key[..])?;
                            }
                        }
                    }
                    if let Some((key, value)) = &signature_write {
                        signatures.insert(key.as_slice(), value.as_slice())?;
                    }
                    if let Some(value) = &tip_write {
                        metadata.insert(META_TIP, value.as_slice())?;
                    }
                    Ok::<(), ConflictableTransactionError<()>>(())
                },
            );

        match result {
            Ok(()) => {}
            Err(TransactionError::Storage(e)) => return Err(DbError::Sled(e)),
            Err(TransactionError::Abort(())) => {
                return Err(DbError::Serialization("commit aborted".to_string()))
            }
        }

        self.db.flush()?;
        Ok(())
    }

    // -- Utility ------------------------------------------------------------

    /// BLAKE3 Merkle root over every account, in address order.
    pub fn state_root(&self) -> DbResult<[u8; 32]> {
        let mut leaves = Vec::with_capacity(self.accounts.len());
        for entry in self.accounts.iter() {
            let (key, value) = entry?;
            let address =
                Pubkey::try_from_slice(&key).map_err(|_| DbError::CorruptKey("accounts"))?;
            let account: Account = decode(&value)?;
            leaves.push(account.state_leaf(&address));
        }
        Ok(merkle_root(&leaves))
    }

    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! # Slot Store
//!
//! The one-slot-per-author state machine, run inside the ledger.
//!
//! Each derived address is in exactly one of two states:
//!
//! ```text
//!              create (content valid, author funded)
//!   Vacant  ───────────────────────────────────────►  Occupied
//!           ◄───────────────────────────────────────
//!              delete (signer == record author)
//! ```
//!
//! There is no update. Re-posting means delete, then create.
//!
//! Creating a slot moves the rent-exempt deposit for the full record size
//! from the author into the slot account. Deleting closes the account and
//! returns every lamport it holds to the author.
//!
//! All writes land in a [`WorkingSet`]; the caller decides whether to commit.

use thiserror::Error;
use tracing::{debug, warn};

use tweetslot_protocol::address::AddressDeriver;
use tweetslot_protocol::config::{rent_exempt_minimum, TWEET_ACCOUNT_SPACE};
use tweetslot_protocol::crypto::Pubkey;
use tweetslot_protocol::error::SlotError;
use tweetslot_protocol::record::{Slot, TweetRecord};
use tweetslot_protocol::storage::{Account, DbError};
use tweetslot_protocol::validation::validate_content;

use crate::accounts::WorkingSet;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    /// A rule of the slot state machine refused the operation.
    #[error(transparent)]
    Slot(#[from] SlotError),

    /// The database failed underneath. The operation did not happen.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl StoreError {
    pub fn slot_error(&self) -> Option<&SlotError> {
        match self {
            StoreError::Slot(e) => Some(e),
            StoreError::Db(_) => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// SlotStore
// ---------------------------------------------------------------------------

pub struct SlotStore<'a> {
    accounts: WorkingSet<'a>,
    deriver: AddressDeriver,
}

impl<'a> SlotStore<'a> {
    pub fn new(accounts: WorkingSet<'a>, deriver: AddressDeriver) -> Self {
        Self { accounts, deriver }
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Rent deposit locked in every slot.
    pub fn slot_rent() -> u64 {
        rent_exempt_minimum(TWEET_ACCOUNT_SPACE)
    }

    /// Claim `author`'s slot with `content`, stamped `now`.
    ///
    /// Fails with `ContentTooLong`, `AlreadyOccupied` or `InsufficientFunds`,
    /// checked in that order. Nothing is written on failure.
    pub fn create(&mut self, author: &Pubkey, content: &str, now: i64) -> StoreResult<Pubkey> {
        validate_content(content).map_err(SlotError::from)?;

        let (address, _) = self
            .deriver
            .tweet_address(author)
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;

        if self.accounts.get(&address)?.is_some() {
            return Err(SlotError::AlreadyOccupied.into());
        }

        let rent = Self::slot_rent();
        let mut payer = self.accounts.get(author)?.unwrap_or_default();
        if payer.lamports < rent {
            return Err(SlotError::InsufficientFunds {
                needed: rent,
                available: payer.lamports,
            }
            .into());
        }

        let record = TweetRecord {
            author: *author,
            content: content.to_string(),
            timestamp: now,
        };
        let data = record
            .encode()
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;

        payer.lamports -= rent;
        self.accounts.put(*author, payer);
        self.accounts
            .put(address, Account::new(rent, *self.deriver.program_id(), data));

        debug!(%address, %author, "slot created");
        Ok(address)
    }

    /// The slot at `address`. Vacant, foreign-owned and malformed accounts
    /// all read as `NotFound`.
    pub fn fetch(&self, address: &Pubkey) -> StoreResult<Slot> {
        let account = self.accounts.get(address)?.ok_or(SlotError::NotFound)?;
        if !account.is_owned_by(self.deriver.program_id()) {
            return Err(SlotError::NotFound.into());
        }
        Slot::decode(*address, &account.data).map_err(|e| {
            warn!(%address, error = %e, "unreadable slot record");
            StoreError::Slot(SlotError::NotFound)
        })
    }

    /// Every occupied slot. Unordered.
    pub fn fetch_all(&self) -> StoreResult<Vec<Slot>> {
        let accounts = self.accounts.program_accounts(self.deriver.program_id())?;
        Ok(accounts
            .into_iter()
            .filter_map(|(address, account)| Slot::decode(address, &account.data).ok())
            .collect())
    }

    /// Vacate `address` on behalf of `author`, refunding its lamports.
    ///
    /// Fails with `NotFound` if vacant, `Unauthorized` if `author` did not
    /// create the record.
    pub fn delete(&mut self, author: &Pubkey, address: &Pubkey) -> StoreResult<()> {
        let slot_account = self.accounts.get(address)?.ok_or(SlotError::NotFound)?;
        let slot = self.fetch(address)?;
        if slot.author != *author {
            return Err(SlotError::Unauthorized.into());
        }

        let mut payer = self.accounts.get(author)?.unwrap_or_default();
        payer.lamports = payer
            .lamports
            .checked_add(slot_account.lamports)
            .ok_or_else(|| SlotError::InvalidInstruction("lamport overflow".into()))?;

        self.accounts.put(*author, payer);
        self.accounts.remove(*address);

        debug!(%address, %author, refunded = slot_account.lamports, "slot deleted");
        Ok(())
    }

    pub fn into_changes(self) -> Vec<(Pubkey, Option<Account>)> {
        self.accounts.into_changes()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

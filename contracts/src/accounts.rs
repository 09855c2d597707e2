//! Transaction working set.
//!
//! Program code never writes to the database directly. It reads through a
//! [`WorkingSet`], which layers uncommitted changes over [`LedgerDb`], and
//! the runtime commits the accumulated changes in one batch only if the
//! whole instruction succeeded. A failed instruction leaves no trace.

use std::collections::BTreeMap;

use tweetslot_protocol::crypto::Pubkey;
use tweetslot_protocol::storage::{Account, DbError, LedgerDb};

pub struct WorkingSet<'a> {
    db: &'a LedgerDb,
    overlay: BTreeMap<Pubkey, Option<Account>>,
}

impl<'a> WorkingSet<'a> {
    pub fn new(db: &'a LedgerDb) -> Self {
        Self {
            db,
            overlay: BTreeMap::new(),
        }
    }

    pub fn get(&self, address: &Pubkey) -> Result<Option<Account>, DbError> {
        match self.overlay.get(address) {
            Some(pending) => Ok(pending.clone()),
            None => self.db.get_account(address),
        }
    }

    pub fn put(&mut self, address: Pubkey, account: Account) {
        self.overlay.insert(address, Some(account));
    }

    pub fn remove(&mut self, address: Pubkey) {
        self.overlay.insert(address, None);
    }

    /// Committed accounts owned by `program_id` with pending changes applied.
    pub fn program_accounts(&self, program_id: &Pubkey) -> Result<Vec<(Pubkey, Account)>, DbError> {
        let mut merged: BTreeMap<Pubkey, Account> =
            self.db.program_accounts(program_id)?.into_iter().collect();
        for (address, pending) in &self.overlay {
            match pending {
                Some(account) if account.is_owned_by(program_id) => {
                    merged.insert(*address, account.clone());
                }
                _ => {
                    merged.remove(address);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    pub fn is_dirty(&self) -> bool {
        !self.overlay.is_empty()
    }

    pub fn into_changes(self) -> Vec<(Pubkey, Option<Account>)> {
        self.overlay.into_iter().collect()
    }
}

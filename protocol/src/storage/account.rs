//! Ledger accounts.
//!
//! An account is a lamport balance, an owning program and an opaque data
//! buffer. Identities are plain accounts owned by the system program with
//! empty data; slots are accounts owned by the tweet program whose data is
//! an encoded [`TweetRecord`](crate::record::TweetRecord).

use serde::{Deserialize, Serialize};

use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::Pubkey;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub lamports: u64,
    pub owner: Pubkey,
    pub data: Vec<u8>,
}

impl Account {
    /// A system-owned account holding only lamports.
    pub fn system(lamports: u64) -> Self {
        Self {
            lamports,
            owner: SYSTEM_PROGRAM_ID,
            data: Vec::new(),
        }
    }

    pub fn new(lamports: u64, owner: Pubkey, data: Vec<u8>) -> Self {
        Self {
            lamports,
            owner,
            data,
        }
    }

    pub fn is_owned_by(&self, program_id: &Pubkey) -> bool {
        self.owner == *program_id
    }

    /// Leaf hash for the ledger state root: `BLAKE3(address || lamports || owner || data)`.
    pub fn state_leaf(&self, address: &Pubkey) -> [u8; 32] {
        let mut preimage = Vec::with_capacity(32 + 8 + 32 + self.data.len());
        preimage.extend_from_slice(address.as_bytes());
        preimage.extend_from_slice(&self.lamports.to_le_bytes());
        preimage.extend_from_slice(self.owner.as_bytes());
        preimage.extend_from_slice(&self.data);
        blake3_hash(&preimage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_account_is_empty() {
        let acct = Account::system(500);
        assert_eq!(acct.lamports, 500);
        assert!(acct.data.is_empty());
        assert!(acct.is_owned_by(&SYSTEM_PROGRAM_ID));
    }

    #[test]
    fn state_leaf_depends_on_address_and_contents() {
        let a = Pubkey::new_from_array([1u8; 32]);
        let b = Pubkey::new_from_array([2u8; 32]);
        let acct = Account::system(10);

        assert_ne!(acct.state_leaf(&a), acct.state_leaf(&b));
        assert_ne!(acct.state_leaf(&a), Account::system(11).state_leaf(&a));
    }
}

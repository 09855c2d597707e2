//! # Tweet Program
//!
//! Instruction processor: decodes a tweet instruction, checks the accounts
//! it names, and runs the matching [`SlotStore`] operation.
//!
//! Content is validated again here even though every honest client checks
//! it first. The ledger never trusts the client.

use serde::{Deserialize, Serialize};

use tweetslot_protocol::address::AddressDeriver;
use tweetslot_protocol::config::SYSTEM_PROGRAM_ID;
use tweetslot_protocol::crypto::Pubkey;
use tweetslot_protocol::error::SlotError;
use tweetslot_protocol::transaction::{AccountMeta, Instruction, TweetInstruction};

use crate::store::{SlotStore, StoreResult};

/// What a successful instruction did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgramEffect {
    TweetSent {
        address: Pubkey,
        author: Pubkey,
        content: String,
        timestamp: i64,
    },
    TweetDeleted {
        address: Pubkey,
        author: Pubkey,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct TweetProgram {
    deriver: AddressDeriver,
}

impl TweetProgram {
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            deriver: AddressDeriver::new(program_id),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        self.deriver.program_id()
    }

    pub fn deriver(&self) -> AddressDeriver {
        self.deriver
    }

    /// Execute `ix`, signed by `signer`, at ledger time `now`.
    pub fn process(
        &self,
        store: &mut SlotStore<'_>,
        ix: &Instruction,
        signer: &Pubkey,
        now: i64,
    ) -> StoreResult<ProgramEffect> {
        if ix.program_id != *self.program_id() {
            return Err(SlotError::InvalidInstruction(format!(
                "instruction targets program {}",
                ix.program_id
            ))
            .into());
        }

        let decoded = TweetInstruction::unpack(&ix.data)
            .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;

        match decoded {
            TweetInstruction::SendTweet { content } => {
                let [slot_meta, author_meta, system_meta] = expect_accounts::<3>(&ix.accounts)?;
                check_author(author_meta, signer)?;

                let (expected, _) = self
                    .deriver
                    .tweet_address(signer)
                    .map_err(|e| SlotError::InvalidInstruction(e.to_string()))?;
                if slot_meta.pubkey != expected || !slot_meta.is_writable {
                    return Err(SlotError::AccountMismatch.into());
                }
                if system_meta.pubkey != SYSTEM_PROGRAM_ID {
                    return Err(SlotError::AccountMismatch.into());
                }

                let address = store.create(signer, &content, now)?;
                Ok(ProgramEffect::TweetSent {
                    address,
                    author: *signer,
                    content,
                    timestamp: now,
                })
            }
            TweetInstruction::DeleteTweet => {
                let [slot_meta, author_meta] = expect_accounts::<2>(&ix.accounts)?;
                check_author(author_meta, signer)?;
                if !slot_meta.is_writable {
                    return Err(SlotError::AccountMismatch.into());
                }

                // Authorship is checked against the stored record, so a
                // stranger naming someone else's slot gets `Unauthorized`.
                store.delete(signer, &slot_meta.pubkey)?;
                Ok(ProgramEffect::TweetDeleted {
                    address: slot_meta.pubkey,
                    author: *signer,
                })
            }
        }
    }
}

fn expect_accounts<const N: usize>(accounts: &[AccountMeta]) -> Result<[&AccountMeta; N], SlotError> {
    if accounts.len() != N {
        return Err(SlotError::InvalidInstruction(format!(
            "expected {N} accounts, got {}",
            accounts.len()
        )));
    }
    let mut out = [&accounts[0]; N];
    for (slot, meta) in out.iter_mut().zip(accounts) {
        *slot = meta;
    }
    Ok(out)
}

fn check_author(meta: &AccountMeta, signer: &Pubkey) -> Result<(), SlotError> {
    if meta.pubkey != *signer || !meta.is_signer {
        return Err(SlotError::Unauthorized);
    }
    Ok(())
}

//! Tweet program instructions.
//!
//! Instruction data is an 8-byte method discriminator,
//! `sha256("global:<method>")[..8]`, followed by the method's arguments.
//! `send_tweet` carries its content as a `u32` LE byte length plus UTF-8;
//! `delete_tweet` carries nothing.
//!
//! Account order is fixed per method:
//!
//! | Method         | 0                  | 1                      | 2              |
//! |----------------|--------------------|------------------------|----------------|
//! | `send_tweet`   | slot (writable)    | author (signer, writable) | system program |
//! | `delete_tweet` | slot (writable)    | author (signer, writable) |                |

use serde::{Deserialize, Serialize};

use super::verification::TransactionError;
use crate::address::AddressDeriver;
use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::hash::discriminator;
use crate::crypto::keys::Pubkey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

/// One program invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

/// Decoded instruction data of the tweet program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetInstruction {
    SendTweet { content: String },
    DeleteTweet,
}

impl TweetInstruction {
    pub fn send_tweet_discriminator() -> [u8; 8] {
        discriminator("global", "send_tweet")
    }

    pub fn delete_tweet_discriminator() -> [u8; 8] {
        discriminator("global", "delete_tweet")
    }

    pub fn pack(&self) -> Vec<u8> {
        match self {
            TweetInstruction::SendTweet { content } => {
                let mut data = Vec::with_capacity(12 + content.len());
                data.extend_from_slice(&Self::send_tweet_discriminator());
                data.extend_from_slice(&(content.len() as u32).to_le_bytes());
                data.extend_from_slice(content.as_bytes());
                data
            }
            TweetInstruction::DeleteTweet => Self::delete_tweet_discriminator().to_vec(),
        }
    }

    /// Content length is not validated here; the program does that so the
    /// rejection carries the content error code.
    pub fn unpack(data: &[u8]) -> Result<Self, TransactionError> {
        if data.len() < 8 {
            return Err(TransactionError::InvalidInstruction(
                "instruction data shorter than discriminator".into(),
            ));
        }
        let (tag, rest) = data.split_at(8);

        if tag == Self::send_tweet_discriminator() {
            if rest.len() < 4 {
                return Err(TransactionError::InvalidInstruction(
                    "missing content length".into(),
                ));
            }
            let (len_bytes, body) = rest.split_at(4);
            let mut len_buf = [0u8; 4];
            len_buf.copy_from_slice(len_bytes);
            let len = u32::from_le_bytes(len_buf) as usize;
            if body.len() != len {
                return Err(TransactionError::InvalidInstruction(format!(
                    "content length {len} does not match {} payload bytes",
                    body.len()
                )));
            }
            let content = std::str::from_utf8(body)
                .map_err(|_| TransactionError::InvalidInstruction("content is not UTF-8".into()))?
                .to_string();
            return Ok(TweetInstruction::SendTweet { content });
        }

        if tag == Self::delete_tweet_discriminator() {
            if !rest.is_empty() {
                return Err(TransactionError::InvalidInstruction(
                    "delete_tweet takes no arguments".into(),
                ));
            }
            return Ok(TweetInstruction::DeleteTweet);
        }

        Err(TransactionError::InvalidInstruction(
            "unknown instruction discriminator".into(),
        ))
    }
}

/// `send_tweet` against the author's derived slot.
pub fn send_tweet(
    deriver: &AddressDeriver,
    author: &Pubkey,
    content: &str,
) -> Result<Instruction, TransactionError> {
    let (slot, _) = deriver.tweet_address(author)?;
    Ok(Instruction {
        program_id: *deriver.program_id(),
        accounts: vec![
            AccountMeta::writable(slot, false),
            AccountMeta::writable(*author, true),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
        ],
        data: TweetInstruction::SendTweet {
            content: content.to_string(),
        }
        .pack(),
    })
}

/// `delete_tweet` against the author's derived slot.
pub fn delete_tweet(deriver: &AddressDeriver, author: &Pubkey) -> Result<Instruction, TransactionError> {
    let (slot, _) = deriver.tweet_address(author)?;
    Ok(Instruction {
        program_id: *deriver.program_id(),
        accounts: vec![
            AccountMeta::writable(slot, false),
            AccountMeta::writable(*author, true),
        ],
        data: TweetInstruction::DeleteTweet.pack(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_program_id;
    use crate::crypto::keys::Keypair;

    #[test]
    fn discriminators_differ() {
        assert_ne!(
            TweetInstruction::send_tweet_discriminator(),
            TweetInstruction::delete_tweet_discriminator()
        );
    }

    #[test]
    fn send_tweet_data_layout() {
        let data = TweetInstruction::SendTweet {
            content: "hey".into(),
        }
        .pack();
        assert_eq!(&data[..8], &TweetInstruction::send_tweet_discriminator());
        assert_eq!(&data[8..12], &3u32.to_le_bytes());
        assert_eq!(&data[12..], b"hey");
        assert_eq!(
            TweetInstruction::unpack(&data).unwrap(),
            TweetInstruction::SendTweet {
                content: "hey".into()
            }
        );
    }

    #[test]
    fn delete_tweet_is_bare_discriminator() {
        let data = TweetInstruction::DeleteTweet.pack();
        assert_eq!(data.len(), 8);
        assert_eq!(TweetInstruction::unpack(&data).unwrap(), TweetInstruction::DeleteTweet);
    }

    #[test]
    fn unpack_rejects_garbage() {
        assert!(TweetInstruction::unpack(&[1, 2, 3]).is_err());
        assert!(TweetInstruction::unpack(&[0u8; 8]).is_err());

        let mut data = TweetInstruction::SendTweet {
            content: "abc".into(),
        }
        .pack();
        data.pop();
        assert!(TweetInstruction::unpack(&data).is_err());
    }

    #[test]
    fn send_tweet_accounts_target_derived_slot() {
        let deriver = AddressDeriver::new(default_program_id());
        let author = Keypair::from_seed(&[8u8; 32]).pubkey();
        let ix = send_tweet(&deriver, &author, "hi").unwrap();
        let (slot, _) = deriver.tweet_address(&author).unwrap();

        assert_eq!(ix.program_id, default_program_id());
        assert_eq!(ix.accounts[0].pubkey, slot);
        assert!(ix.accounts[1].is_signer);
        assert_eq!(ix.accounts[1].pubkey, author);
        assert_eq!(ix.accounts[2].pubkey, SYSTEM_PROGRAM_ID);
    }
}

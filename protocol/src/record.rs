//! # Tweet Record Layout
//!
//! The serialized form of a slot as it sits in account data:
//!
//! ```text
//! offset  size  field
//! 0       8     discriminator = sha256("account:Tweet")[..8]
//! 8       32    author pubkey
//! 40      4     content byte length (u32 LE)
//! 44      n     content, UTF-8
//! 44+n    8     timestamp (i64 LE, seconds since epoch)
//! …             zero padding up to TWEET_ACCOUNT_SPACE
//! ```
//!
//! Raw account bytes coming back from a ledger are untrusted. [`TweetRecord::decode`]
//! turns them into a typed record or a [`RecordError`]; nothing downstream
//! ever sees a half-parsed shape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{
    DISCRIMINATOR_LENGTH, MAX_CONTENT_BYTES, PUBLIC_KEY_LENGTH, STRING_LENGTH_PREFIX,
    TIMESTAMP_LENGTH, TWEET_ACCOUNT_SPACE,
};
use crate::crypto::hash::discriminator;
use crate::crypto::keys::Pubkey;
use crate::validation::{validate_content, ValidationError};

/// Errors decoding or encoding a tweet record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("record discriminator mismatch")]
    BadDiscriminator,

    #[error("content length prefix {0} exceeds the record limit")]
    LengthPrefixTooLarge(usize),

    #[error("content is not valid UTF-8")]
    InvalidUtf8,

    #[error(transparent)]
    InvalidContent(#[from] ValidationError),

    #[error("encoded record ({0} bytes) exceeds the account space")]
    TooLarge(usize),
}

/// The persisted contents of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TweetRecord {
    pub author: Pubkey,
    pub content: String,
    pub timestamp: i64,
}

impl TweetRecord {
    /// `sha256("account:Tweet")[..8]`.
    pub fn discriminator() -> [u8; 8] {
        discriminator("account", "Tweet")
    }

    /// Serialize into exactly [`TWEET_ACCOUNT_SPACE`] bytes.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let content = self.content.as_bytes();
        let used = DISCRIMINATOR_LENGTH
            + PUBLIC_KEY_LENGTH
            + STRING_LENGTH_PREFIX
            + content.len()
            + TIMESTAMP_LENGTH;
        if used > TWEET_ACCOUNT_SPACE {
            return Err(RecordError::TooLarge(used));
        }

        let mut buf = Vec::with_capacity(TWEET_ACCOUNT_SPACE);
        buf.extend_from_slice(&Self::discriminator());
        buf.extend_from_slice(self.author.as_bytes());
        buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
        buf.extend_from_slice(content);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.resize(TWEET_ACCOUNT_SPACE, 0);
        Ok(buf)
    }

    /// Parse account data. Trailing padding is ignored.
    pub fn decode(data: &[u8]) -> Result<Self, RecordError> {
        let mut reader = Reader::new(data);

        if reader.take(DISCRIMINATOR_LENGTH)? != Self::discriminator() {
            return Err(RecordError::BadDiscriminator);
        }

        let author = Pubkey::try_from_slice(reader.take(PUBLIC_KEY_LENGTH)?)
            .map_err(|_| RecordError::Truncated {
                needed: PUBLIC_KEY_LENGTH,
                available: 0,
            })?;

        let len = u32::from_le_bytes(reader.array::<4>()?) as usize;
        if len > MAX_CONTENT_BYTES {
            return Err(RecordError::LengthPrefixTooLarge(len));
        }
        let content = std::str::from_utf8(reader.take(len)?)
            .map_err(|_| RecordError::InvalidUtf8)?
            .to_string();
        validate_content(&content)?;

        let timestamp = i64::from_le_bytes(reader.array::<8>()?);

        Ok(Self {
            author,
            content,
            timestamp,
        })
    }

    /// Returns `true` if `data` starts with the tweet discriminator. Cheap
    /// pre-filter for account scans.
    pub fn matches(data: &[u8]) -> bool {
        data.len() >= DISCRIMINATOR_LENGTH && data[..DISCRIMINATOR_LENGTH] == Self::discriminator()
    }
}

/// Cursor over untrusted bytes.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RecordError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(RecordError::Truncated {
                needed: end,
                available: self.data.len(),
            });
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RecordError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }
}

/// A live slot: a decoded record plus the address it was found at.
///
/// This is the one strongly typed shape the client hands to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub address: Pubkey,
    pub author: Pubkey,
    pub content: String,
    pub timestamp: i64,
}

impl Slot {
    pub fn from_record(address: Pubkey, record: TweetRecord) -> Self {
        Self {
            address,
            author: record.author,
            content: record.content,
            timestamp: record.timestamp,
        }
    }

    /// Decode raw account data found at `address`.
    pub fn decode(address: Pubkey, data: &[u8]) -> Result<Self, RecordError> {
        Ok(Self::from_record(address, TweetRecord::decode(data)?))
    }
}

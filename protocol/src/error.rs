//! # Ledger Error Taxonomy
//!
//! Every rejection the tweet program or the ledger runtime can produce has a
//! stable numeric code. Codes cross the RPC boundary as [`LedgerError`] and
//! collaborators classify them back into [`SlotError`] by code alone; the
//! message text is for humans and may change.
//!
//! | Code | Kind               |
//! |------|--------------------|
//! | 6000 | ContentTooLong     |
//! | 6001 | AlreadyOccupied    |
//! | 6002 | NotFound           |
//! | 6003 | Unauthorized       |
//! | 6004 | InsufficientFunds  |
//! | 6005 | InvalidSignature   |
//! | 6006 | BlockhashNotFound  |
//! | 6007 | InvalidInstruction |
//! | 6008 | AccountMismatch    |

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crypto::keys::Signature;
use crate::validation::ValidationError;

// ---------------------------------------------------------------------------
// Error codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorCode {
    ContentTooLong = 6000,
    AlreadyOccupied = 6001,
    NotFound = 6002,
    Unauthorized = 6003,
    InsufficientFunds = 6004,
    InvalidSignature = 6005,
    BlockhashNotFound = 6006,
    InvalidInstruction = 6007,
    AccountMismatch = 6008,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 9] = [
        ErrorCode::ContentTooLong,
        ErrorCode::AlreadyOccupied,
        ErrorCode::NotFound,
        ErrorCode::Unauthorized,
        ErrorCode::InsufficientFunds,
        ErrorCode::InvalidSignature,
        ErrorCode::BlockhashNotFound,
        ErrorCode::InvalidInstruction,
        ErrorCode::AccountMismatch,
    ];

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_u32() == code)
    }

    /// Canonical message. Stable, but collaborators must not match on it.
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ContentTooLong => "The tweet is too long",
            ErrorCode::AlreadyOccupied => "tweet account already in use",
            ErrorCode::NotFound => "Account does not exist",
            ErrorCode::Unauthorized => "signer is not the tweet author",
            ErrorCode::InsufficientFunds => "insufficient funds for rent",
            ErrorCode::InvalidSignature => "transaction signature verification failed",
            ErrorCode::BlockhashNotFound => "Blockhash not found",
            ErrorCode::InvalidInstruction => "invalid instruction data",
            ErrorCode::AccountMismatch => "account does not match the derived address",
        }
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// A rejection as it travels over the wire: `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("ledger error {code}: {message}")]
pub struct LedgerError {
    pub code: u32,
    pub message: String,
}

impl LedgerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_u32(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_u32(self.code)
    }

    /// Map back to a typed error by code.
    pub fn classify(&self) -> SlotError {
        SlotError::from(self.clone())
    }
}

// ---------------------------------------------------------------------------
// SlotError
// ---------------------------------------------------------------------------

/// Typed failure of a slot operation.
///
/// Everything except [`SlotError::Transient`] and [`SlotError::Other`] has a
/// ledger code. `Transient` never leaves the client: it means the outcome is
/// unknown (network failure, timeout) and the operation may be retried. When
/// a signed request went out, `signature` identifies it so the caller can
/// look up its status before retrying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("The tweet is too long: {length} characters (max {max})")]
    ContentTooLong { length: usize, max: usize },

    #[error("tweet account already in use")]
    AlreadyOccupied,

    #[error("Account does not exist")]
    NotFound,

    #[error("signer is not the tweet author")]
    Unauthorized,

    #[error("insufficient funds for rent: need {needed} lamports, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("transaction signature verification failed")]
    InvalidSignature,

    #[error("Blockhash not found")]
    BlockhashNotFound,

    #[error("invalid instruction data: {0}")]
    InvalidInstruction(String),

    #[error("account does not match the derived address")]
    AccountMismatch,

    #[error("transient failure: {reason}")]
    Transient {
        reason: String,
        signature: Option<Signature>,
    },

    /// A code this client does not know.
    #[error("ledger error {code}: {message}")]
    Other { code: u32, message: String },
}

impl SlotError {
    pub fn code(&self) -> Option<ErrorCode> {
        Some(match self {
            SlotError::ContentTooLong { .. } => ErrorCode::ContentTooLong,
            SlotError::AlreadyOccupied => ErrorCode::AlreadyOccupied,
            SlotError::NotFound => ErrorCode::NotFound,
            SlotError::Unauthorized => ErrorCode::Unauthorized,
            SlotError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            SlotError::InvalidSignature => ErrorCode::InvalidSignature,
            SlotError::BlockhashNotFound => ErrorCode::BlockhashNotFound,
            SlotError::InvalidInstruction(_) => ErrorCode::InvalidInstruction,
            SlotError::AccountMismatch => ErrorCode::AccountMismatch,
            SlotError::Transient { .. } | SlotError::Other { .. } => return None,
        })
    }

    /// Numeric code, including codes this client does not recognize.
    pub fn raw_code(&self) -> Option<u32> {
        match self {
            SlotError::Other { code, .. } => Some(*code),
            other => other.code().map(ErrorCode::as_u32),
        }
    }

    /// A transient failure before anything was signed or sent.
    pub fn transient(reason: impl Into<String>) -> Self {
        SlotError::Transient {
            reason: reason.into(),
            signature: None,
        }
    }

    /// Identity of the request whose outcome is unknown, if one was sent.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SlotError::Transient { signature, .. } => signature.as_ref(),
            _ => None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, SlotError::Transient { .. })
    }

    /// Wire form of a ledger-side rejection. `None` for client-only errors.
    pub fn to_ledger_error(&self) -> Option<LedgerError> {
        match self {
            SlotError::Transient { .. } => None,
            SlotError::Other { code, message } => Some(LedgerError {
                code: *code,
                message: message.clone(),
            }),
            other => other
                .code()
                .map(|code| LedgerError::new(code, other.to_string())),
        }
    }
}

impl From<ValidationError> for SlotError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::ContentTooLong { length, max } => {
                SlotError::ContentTooLong { length, max }
            }
        }
    }
}

impl From<LedgerError> for SlotError {
    fn from(err: LedgerError) -> Self {
        // Detail fields do not survive the wire; only the kind does.
        match err.kind() {
            Some(ErrorCode::ContentTooLong) => SlotError::ContentTooLong {
                length: 0,
                max: crate::config::MAX_CONTENT_CHARS,
            },
            Some(ErrorCode::AlreadyOccupied) => SlotError::AlreadyOccupied,
            Some(ErrorCode::NotFound) => SlotError::NotFound,
            Some(ErrorCode::Unauthorized) => SlotError::Unauthorized,
            Some(ErrorCode::InsufficientFunds) => SlotError::InsufficientFunds {
                needed: 0,
                available: 0,
            },
            Some(ErrorCode::InvalidSignature) => SlotError::InvalidSignature,
            Some(ErrorCode::BlockhashNotFound) => SlotError::BlockhashNotFound,
            Some(ErrorCode::InvalidInstruction) => SlotError::InvalidInstruction(err.message),
            Some(ErrorCode::AccountMismatch) => SlotError::AccountMismatch,
            None => SlotError::Other {
                code: err.code,
                message: err.message,
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorCode::ContentTooLong.as_u32(), 6000);
        assert_eq!(ErrorCode::AlreadyOccupied.as_u32(), 6001);
        assert_eq!(ErrorCode::NotFound.as_u32(), 6002);
        assert_eq!(ErrorCode::Unauthorized.as_u32(), 6003);
        assert_eq!(ErrorCode::AccountMismatch.as_u32(), 6008);
    }

    #[test]
    fn every_code_round_trips_through_u32() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_u32(code.as_u32()), Some(code));
        }
        assert_eq!(ErrorCode::from_u32(42), None);
    }

    #[test]
    fn canonical_messages() {
        assert_eq!(ErrorCode::ContentTooLong.message(), "The tweet is too long");
        assert_eq!(ErrorCode::AlreadyOccupied.message(), "tweet account already in use");
        assert_eq!(ErrorCode::NotFound.message(), "Account does not exist");
    }

    #[test]
    fn classification_ignores_message_text() {
        let err = LedgerError {
            code: 6001,
            message: "something unrelated".into(),
        };
        assert_eq!(err.classify(), SlotError::AlreadyOccupied);
    }

    #[test]
    fn unknown_code_is_preserved() {
        let err = LedgerError {
            code: 7777,
            message: "custom".into(),
        };
        let classified = err.classify();
        assert_eq!(classified.code(), None);
        assert_eq!(classified.raw_code(), Some(7777));
        assert_eq!(classified.to_ledger_error(), Some(err));
    }

    #[test]
    fn transient_has_no_wire_form() {
        let err = SlotError::transient("timeout");
        assert!(err.is_transient());
        assert!(err.signature().is_none());
        assert!(err.code().is_none());
        assert!(err.to_ledger_error().is_none());
    }

    #[test]
    fn validation_error_maps_to_content_too_long() {
        let err: SlotError = ValidationError::ContentTooLong {
            length: 300,
            max: 250,
        }
        .into();
        assert_eq!(err.code(), Some(ErrorCode::ContentTooLong));
        assert!(err.to_string().starts_with("The tweet is too long"));
    }
}

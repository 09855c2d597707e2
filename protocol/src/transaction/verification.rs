//! Transaction verification: structural checks and signature validation.
//!
//! The ledger runs [`verify_transaction`] before anything else touches the
//! transaction. Checks go from cheapest to most expensive so malformed input
//! is rejected before any curve arithmetic.

use thiserror::Error;

use super::builder::Transaction;
use crate::address::AddressError;
use crate::config::MESSAGE_VERSION;
use crate::error::{ErrorCode, LedgerError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("too many accounts: {0}")]
    TooManyAccounts(usize),

    #[error("unsupported message version {0}")]
    UnsupportedVersion(u8),

    #[error("transaction is unsigned")]
    MissingSignature,

    #[error("signer {actual} is not the fee payer {expected}")]
    SignerMismatch { expected: String, actual: String },

    #[error("signature does not verify against the fee payer")]
    InvalidSignature,

    #[error("fee payer must be a signer of the instruction")]
    FeePayerNotSigner,

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Address(#[from] AddressError),
}

impl TransactionError {
    /// Ledger-facing form of a verification failure.
    pub fn to_ledger_error(&self) -> LedgerError {
        let code = match self {
            TransactionError::MissingSignature
            | TransactionError::SignerMismatch { .. }
            | TransactionError::InvalidSignature
            | TransactionError::FeePayerNotSigner => ErrorCode::InvalidSignature,
            _ => ErrorCode::InvalidInstruction,
        };
        LedgerError::new(code, self.to_string())
    }
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a signed transaction.
///
/// 1. Message version is supported.
/// 2. The fee payer appears in the instruction as a signer.
/// 3. A signature is present.
/// 4. The signature verifies against the fee payer over the signable bytes.
pub fn verify_transaction(tx: &Transaction) -> Result<(), TransactionError> {
    let message = &tx.message;

    if message.version != MESSAGE_VERSION {
        return Err(TransactionError::UnsupportedVersion(message.version));
    }

    let payer_signs = message
        .instruction
        .accounts
        .iter()
        .any(|meta| meta.pubkey == message.fee_payer && meta.is_signer);
    if !payer_signs {
        return Err(TransactionError::FeePayerNotSigner);
    }

    let signature = tx.signature.as_ref().ok_or(TransactionError::MissingSignature)?;
    if !message.fee_payer.verify(&message.signable_bytes(), signature) {
        return Err(TransactionError::InvalidSignature);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

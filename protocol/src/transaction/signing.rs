//! Transaction signing with Ed25519 keypairs.
//!
//! The signature covers [`Message::signable_bytes`]. Ed25519 is
//! deterministic, so signing the same message twice yields the same
//! signature, and therefore the same transaction id. The submitter relies on
//! that when it resends a transaction after a timeout.

use super::builder::{Message, Transaction};
use super::verification::TransactionError;
use crate::crypto::keys::Keypair;

/// Sign `message` as its fee payer.
///
/// Fails with [`TransactionError::SignerMismatch`] if `keypair` is not the
/// message's fee payer.
pub fn sign_transaction(message: Message, keypair: &Keypair) -> Result<Transaction, TransactionError> {
    if keypair.pubkey() != message.fee_payer {
        return Err(TransactionError::SignerMismatch {
            expected: message.fee_payer.to_string(),
            actual: keypair.pubkey().to_string(),
        });
    }
    let signature = keypair.sign(&message.signable_bytes());
    Ok(Transaction {
        message,
        signature: Some(signature),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

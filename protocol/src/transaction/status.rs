//! Processed-signature status.
//!
//! The ledger records one [`SignatureStatus`] per executed signature, success
//! or failure. A single-node ledger commits synchronously, so a recorded
//! status is already final.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    /// Slot the transaction was processed in.
    pub slot: u64,
    /// `None` when the transaction was applied.
    pub err: Option<LedgerError>,
}

impl SignatureStatus {
    pub fn applied(slot: u64) -> Self {
        Self { slot, err: None }
    }

    pub fn failed(slot: u64, err: LedgerError) -> Self {
        Self {
            slot,
            err: Some(err),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.err.is_none()
    }
}

//! # Transaction Submitter
//!
//! Builds, signs, submits and confirms one instruction at a time.
//!
//! Failures fall into three classes and are never confused:
//!
//! - **Local**: the request failed a check before anything was sent.
//! - **Rejected**: the ledger executed the transaction and refused it.
//!   Terminal; retrying cannot help.
//! - **Transient**: the outcome is unknown (connection dropped, timeout).
//!
//! After a transient failure the submitter never blindly re-signs. It first
//! asks the ledger for the status of the signature it already sent. If that
//! signature was applied the result is reported as is; otherwise the *same*
//! signed transaction goes out again, so at most one copy can ever commit.
//! The one exception is `BlockhashNotFound`: that rejection proves the
//! transaction was not applied, so a fresh blockhash and signature are safe.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use super::session::Session;
use super::{ClientError, LedgerClient};
use crate::config::{CONFIRM_POLL_INTERVAL, CONFIRM_TIMEOUT, MAX_SUBMIT_RETRIES};
use crate::crypto::keys::Signature;
use crate::error::{ErrorCode, LedgerError, SlotError};
use crate::transaction::{sign_transaction, Instruction, Transaction, TransactionBuilder, TransactionError};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// Upper bound on waiting for a sent signature to reach a status.
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
    /// Resubmissions after transient failures, and fresh-blockhash re-signs.
    pub max_retries: u32,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            confirm_timeout: CONFIRM_TIMEOUT,
            poll_interval: CONFIRM_POLL_INTERVAL,
            max_retries: MAX_SUBMIT_RETRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SubmitError {
    /// Failed before sending.
    #[error("rejected locally: {0}")]
    Local(SlotError),

    #[error("could not build transaction: {0}")]
    Build(#[from] TransactionError),

    #[error("rejected by ledger: {0}")]
    Rejected(LedgerError),

    /// Outcome unknown. `signature` is set once something was sent, so the
    /// caller can keep checking on it.
    #[error("outcome unknown: {reason}")]
    Transient {
        signature: Option<Signature>,
        reason: String,
    },
}

impl From<SubmitError> for SlotError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Local(e) => e,
            SubmitError::Build(e) => SlotError::InvalidInstruction(e.to_string()),
            SubmitError::Rejected(e) => e.classify(),
            SubmitError::Transient { signature, reason } => SlotError::Transient { reason, signature },
        }
    }
}

/// Outcome of pushing one signed transaction through to a status.
enum Delivery {
    Applied,
    Rejected(LedgerError),
    Unknown(String),
}

// ---------------------------------------------------------------------------
// TransactionSubmitter
// ---------------------------------------------------------------------------

pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    config: SubmitterConfig,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, config: SubmitterConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &SubmitterConfig {
        &self.config
    }

    /// Sign `instruction` under `session` and drive it to a final outcome.
    /// Returns the applied transaction's signature.
    pub async fn submit(&self, session: &Session, instruction: Instruction) -> Result<Signature, SubmitError> {
        let mut last_signature = None;

        for attempt in 0..=self.config.max_retries {
            let blockhash = match self.ledger.latest_blockhash().await {
                Ok((hash, _slot)) => hash,
                Err(ClientError::Rejected(e)) => return Err(SubmitError::Rejected(e)),
                Err(e) => {
                    warn!(attempt, error = %e, "could not fetch blockhash");
                    self.backoff(attempt).await;
                    continue;
                }
            };

            let message = TransactionBuilder::new()
                .fee_payer(session.author())
                .recent_blockhash(blockhash)
                .instruction(instruction.clone())
                .build()?;
            let tx = sign_transaction(message, session.keypair())?;
            let signature = tx
                .id()
                .cloned()
                .ok_or(SubmitError::Build(TransactionError::MissingSignature))?;
            last_signature = Some(signature.clone());

            match self.deliver(&tx, &signature).await {
                Delivery::Applied => return Ok(signature),
                Delivery::Rejected(e) if e.kind() == Some(ErrorCode::BlockhashNotFound) => {
                    debug!(%signature, "blockhash expired, re-signing");
                    continue;
                }
                Delivery::Rejected(e) => return Err(SubmitError::Rejected(e)),
                Delivery::Unknown(reason) => {
                    return Err(SubmitError::Transient {
                        signature: Some(signature),
                        reason,
                    })
                }
            }
        }

        Err(SubmitError::Transient {
            signature: last_signature,
            reason: "retries exhausted".to_string(),
        })
    }

    /// Send one signed transaction until it has a status, resending the same
    /// bytes only when the ledger has no record of the signature.
    async fn deliver(&self, tx: &Transaction, signature: &Signature) -> Delivery {
        let mut last_error = String::from("not sent");

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                match self.status_of(signature).await {
                    Ok(Some(delivery)) => {
                        debug!(%signature, attempt, "found status of earlier send");
                        return delivery;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(%signature, attempt, error = %e, "status check failed");
                        last_error = e.to_string();
                        self.backoff(attempt).await;
                        continue;
                    }
                }
            }

            match self.ledger.send_transaction(tx).await {
                Ok(_) => return self.await_confirmation(signature).await,
                Err(ClientError::Rejected(e)) => return Delivery::Rejected(e),
                Err(e) => {
                    warn!(%signature, attempt, error = %e, "send failed, outcome unknown");
                    last_error = e.to_string();
                    self.backoff(attempt).await;
                }
            }
        }

        // One last look before giving up.
        match self.status_of(signature).await {
            Ok(Some(delivery)) => delivery,
            _ => Delivery::Unknown(last_error),
        }
    }

    async fn status_of(&self, signature: &Signature) -> Result<Option<Delivery>, ClientError> {
        let statuses = self
            .ledger
            .get_signature_statuses(std::slice::from_ref(signature))
            .await?;
        Ok(statuses.into_iter().next().flatten().map(|status| match status.err {
            None => Delivery::Applied,
            Some(e) => Delivery::Rejected(e),
        }))
    }

    /// Poll until the signature has a status or the timeout elapses.
    async fn await_confirmation(&self, signature: &Signature) -> Delivery {
        let deadline = Instant::now() + self.config.confirm_timeout;
        loop {
            match self.status_of(signature).await {
                Ok(Some(delivery)) => return delivery,
                Ok(None) => {}
                Err(e) => debug!(%signature, error = %e, "status poll failed"),
            }
            if Instant::now() >= deadline {
                return Delivery::Unknown(format!(
                    "not confirmed within {:?}",
                    self.config.confirm_timeout
                ));
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn backoff(&self, attempt: u32) {
        let factor = 1u32 << attempt.min(4);
        sleep(self.config.poll_interval * factor).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

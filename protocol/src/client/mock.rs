//! Scripted in-memory ledger for client unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use super::{ClientError, LedgerClient};
use crate::crypto::keys::{Pubkey, Signature};
use crate::error::LedgerError;
use crate::storage::Account;
use crate::transaction::{SignatureStatus, Transaction};

/// What the next `send_transaction` call does. Default is `Apply`.
#[derive(Debug, Clone)]
pub(crate) enum SendBehavior {
    Apply,
    /// Records the transaction as applied but reports a transport error.
    ApplyThenDrop,
    /// Reports a transport error without applying.
    Drop,
    /// Accepts the request but never records a status.
    AcceptWithoutStatus,
    Reject(LedgerError),
}

/// A scripted `getProgramAccounts` reply.
pub(crate) struct ScanReply {
    pub delay: Duration,
    pub result: Result<Vec<(Pubkey, Account)>, ClientError>,
}

#[derive(Default)]
struct State {
    accounts: BTreeMap<Pubkey, Account>,
    statuses: HashMap<Signature, SignatureStatus>,
    blockhash_counter: u8,
    send_script: VecDeque<SendBehavior>,
    scan_script: VecDeque<ScanReply>,
    sent: Vec<Signature>,
}

#[derive(Default)]
pub(crate) struct MockLedger {
    state: Mutex<State>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_account(&self, address: Pubkey, account: Account) {
        self.state.lock().accounts.insert(address, account);
    }

    pub fn script_send(&self, behavior: SendBehavior) {
        self.state.lock().send_script.push_back(behavior);
    }

    pub fn script_scan(&self, reply: ScanReply) {
        self.state.lock().scan_script.push_back(reply);
    }

    pub fn send_calls(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn sent_signatures(&self) -> Vec<Signature> {
        self.state.lock().sent.clone()
    }

    pub fn status(&self, signature: &Signature) -> Option<SignatureStatus> {
        self.state.lock().statuses.get(signature).cloned()
    }

    pub fn applied_count(&self) -> usize {
        self.state
            .lock()
            .statuses
            .values()
            .filter(|s| s.is_applied())
            .count()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_blockhash(&self) -> Result<([u8; 32], u64), ClientError> {
        let mut state = self.state.lock();
        state.blockhash_counter = state.blockhash_counter.wrapping_add(1);
        Ok(([state.blockhash_counter; 32], u64::from(state.blockhash_counter)))
    }

    async fn send_transaction(&self, tx: &Transaction) -> Result<Signature, ClientError> {
        let signature = tx
            .id()
            .cloned()
            .ok_or_else(|| ClientError::Protocol("unsigned".into()))?;
        let mut state = self.state.lock();
        state.sent.push(signature.clone());

        // Dedupe like a real ledger.
        if let Some(status) = state.statuses.get(&signature) {
            return match &status.err {
                None => Ok(signature),
                Some(e) => Err(ClientError::Rejected(e.clone())),
            };
        }

        match state.send_script.pop_front().unwrap_or(SendBehavior::Apply) {
            SendBehavior::Apply => {
                state.statuses.insert(signature.clone(), SignatureStatus::applied(1));
                Ok(signature)
            }
            SendBehavior::ApplyThenDrop => {
                state.statuses.insert(signature, SignatureStatus::applied(1));
                Err(ClientError::Transport("connection reset".into()))
            }
            SendBehavior::Drop => Err(ClientError::Transport("connection refused".into())),
            SendBehavior::AcceptWithoutStatus => Ok(signature),
            SendBehavior::Reject(e) => {
                state
                    .statuses
                    .insert(signature, SignatureStatus::failed(1, e.clone()));
                Err(ClientError::Rejected(e))
            }
        }
    }

    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> Result<Vec<Option<SignatureStatus>>, ClientError> {
        let state = self.state.lock();
        Ok(signatures
            .iter()
            .map(|s| state.statuses.get(s).cloned())
            .collect())
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, ClientError> {
        Ok(self.state.lock().accounts.get(address).cloned())
    }

    async fn get_program_accounts(
        &self,
        program_id: &Pubkey,
    ) -> Result<Vec<(Pubkey, Account)>, ClientError> {
        let scripted = self.state.lock().scan_script.pop_front();
        if let Some(reply) = scripted {
            tokio::time::sleep(reply.delay).await;
            return reply.result;
        }
        Ok(self
            .state
            .lock()
            .accounts
            .iter()
            .filter(|(_, a)| a.is_owned_by(program_id))
            .map(|(k, a)| (*k, a.clone()))
            .collect())
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> Result<Signature, ClientError> {
        let mut state = self.state.lock();
        state.accounts.entry(*to).or_default().lamports += lamports;
        Ok(Signature::zeroed())
    }

    async fn get_balance(&self, address: &Pubkey) -> Result<u64, ClientError> {
        Ok(self
            .state
            .lock()
            .accounts
            .get(address)
            .map(|a| a.lamports)
            .unwrap_or(0))
    }
}

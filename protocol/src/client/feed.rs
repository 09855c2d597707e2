//! # Feed Aggregator
//!
//! Turns an eventually consistent scan of every slot account into an
//! ordered, immutable snapshot.
//!
//! ```text
//! getProgramAccounts ─► decode record ─► verify derived address ─► sort ─► publish
//!                        (drop malformed)  (drop spoofed/stale)   ts desc,
//!                                                                  address asc
//! ```
//!
//! ## Overlapping refreshes
//!
//! Every [`FeedAggregator::refresh`] takes a generation number when it
//! starts. A completed scan publishes if its generation is newer than the
//! last one published, even while a newer refresh is still in flight; a
//! slow scan that finishes after a faster, newer one is discarded. Readers
//! therefore never see the feed move backwards, and an abandoned refresh
//! cannot hold back one that finished.
//!
//! State is published through a `tokio::sync::watch` channel as
//! [`FeedState`]. Snapshots are `Arc`ed and never mutated after publish.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::{ClientError, LedgerClient};
use crate::address::AddressDeriver;
use crate::config::TWEET_SEED;
use crate::crypto::keys::Pubkey;
use crate::error::{LedgerError, SlotError};
use crate::record::{Slot, TweetRecord};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("scan failed: {0}")]
    Transient(String),

    #[error("scan rejected: {0}")]
    Rejected(LedgerError),
}

impl From<ClientError> for FeedError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(e) => FeedError::Rejected(e),
            ClientError::Transport(reason) | ClientError::Protocol(reason) => {
                FeedError::Transient(reason)
            }
        }
    }
}

impl From<FeedError> for SlotError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Transient(reason) => SlotError::transient(reason),
            FeedError::Rejected(e) => e.classify(),
        }
    }
}

/// An immutable, ordered view of every live slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub slots: Vec<Slot>,
    pub refreshed_at: DateTime<Utc>,
    pub generation: u64,
}

impl FeedSnapshot {
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of distinct authors. Equal to `len()` while the one-slot
    /// invariant holds.
    pub fn unique_authors(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.author)
            .collect::<BTreeSet<Pubkey>>()
            .len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    Idle,
    Refreshing { generation: u64 },
    Loaded(Arc<FeedSnapshot>),
    Failed(FeedError),
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Newest first; address breaks timestamp ties so the order is total.
pub fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.address.cmp(&b.address))
    });
}

/// Scan every account of the deriver's program and keep only well-formed
/// records sitting at their author's derived address.
pub async fn scan(ledger: &dyn LedgerClient, deriver: &AddressDeriver) -> Result<Vec<Slot>, FeedError> {
    let accounts = ledger.get_program_accounts(deriver.program_id()).await?;
    let scanned = accounts.len();

    let mut slots: Vec<Slot> = accounts
        .into_iter()
        .filter(|(_, account)| TweetRecord::matches(&account.data))
        .filter_map(|(address, account)| match Slot::decode(address, &account.data) {
            Ok(slot) => Some(slot),
            Err(e) => {
                warn!(%address, error = %e, "discarding malformed record");
                None
            }
        })
        .filter(|slot| {
            let ok = deriver.verify(&slot.address, TWEET_SEED, &slot.author);
            if !ok {
                warn!(address = %slot.address, author = %slot.author, "discarding record at non-derived address");
            }
            ok
        })
        .collect();

    sort_slots(&mut slots);
    debug!(scanned, kept = slots.len(), "feed scan complete");
    Ok(slots)
}

// ---------------------------------------------------------------------------
// FeedAggregator
// ---------------------------------------------------------------------------

pub struct FeedAggregator {
    ledger: Arc<dyn LedgerClient>,
    deriver: AddressDeriver,
    started: AtomicU64,
    published: AtomicU64,
    state: watch::Sender<FeedState>,
    last_loaded: RwLock<Option<Arc<FeedSnapshot>>>,
}

impl FeedAggregator {
    pub fn new(ledger: Arc<dyn LedgerClient>, deriver: AddressDeriver) -> Self {
        let (state, _) = watch::channel(FeedState::Idle);
        Self {
            ledger,
            deriver,
            started: AtomicU64::new(0),
            published: AtomicU64::new(0),
            state,
            last_loaded: RwLock::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Most recently published snapshot, kept across later refreshes and
    /// failures.
    pub fn snapshot(&self) -> Option<Arc<FeedSnapshot>> {
        self.last_loaded.read().clone()
    }

    /// Run one scan. Returns the published snapshot, or `Ok(None)` when a
    /// newer refresh completed before this one.
    pub async fn refresh(&self) -> Result<Option<Arc<FeedSnapshot>>, FeedError> {
        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(FeedState::Refreshing { generation });

        let result = scan(self.ledger.as_ref(), &self.deriver).await;

        let outcome = result.map(|slots| {
            Arc::new(FeedSnapshot {
                slots,
                refreshed_at: Utc::now(),
                generation,
            })
        });

        // The watch sender's lock serializes this check with other publishers.
        let published = self.state.send_if_modified(|state| {
            if self.published.load(Ordering::SeqCst) >= generation {
                return false;
            }
            self.published.store(generation, Ordering::SeqCst);
            *state = match &outcome {
                Ok(snapshot) => FeedState::Loaded(Arc::clone(snapshot)),
                Err(e) => FeedState::Failed(e.clone()),
            };
            true
        });

        if !published {
            debug!(generation, "discarding stale feed refresh");
            return match outcome {
                Ok(_) => Ok(None),
                Err(e) => Err(e),
            };
        }

        let snapshot = outcome?;
        *self.last_loaded.write() = Some(Arc::clone(&snapshot));
        Ok(Some(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::super::mock::{MockLedger, ScanReply};
    use super::*;
    use crate::config::default_program_id;
    use crate::crypto::keys::Keypair;
    use crate::storage::Account;
    use std::time::Duration;

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(default_program_id())
    }

    fn slot_account(seed: u8, content: &str, timestamp: i64) -> (Pubkey, Account) {
        let author = Keypair::from_seed(&[seed; 32]).pubkey();
        let (address, _) = deriver().tweet_address(&author).unwrap();
        let record = TweetRecord {
            author,
            content: content.to_string(),
            timestamp,
        };
        (
            address,
            Account::new(1, default_program_id(), record.encode().unwrap()),
        )
    }

    #[tokio::test]
    async fn scan_orders_newest_first() {
        let ledger = MockLedger::new();
        for (seed, ts) in [(1u8, 100), (2, 300), (3, 200)] {
            let (addr, acct) = slot_account(seed, "x", ts);
            ledger.put_account(addr, acct);
        }

        let slots = scan(&ledger, &deriver()).await.unwrap();
        let timestamps: Vec<i64> = slots.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![300, 200, 100]);
    }

    #[tokio::test]
    async fn equal_timestamps_tie_break_by_address() {
        let ledger = MockLedger::new();
        for seed in [4u8, 5, 6] {
            let (addr, acct) = slot_account(seed, "same", 50);
            ledger.put_account(addr, acct);
        }

        let slots = scan(&ledger, &deriver()).await.unwrap();
        let mut expected: Vec<Pubkey> = slots.iter().map(|s| s.address).collect();
        expected.sort();
        assert_eq!(slots.iter().map(|s| s.address).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn spoofed_address_is_discarded() {
        let ledger = MockLedger::new();
        let (_, acct) = slot_account(7, "imposter", 10);
        // Valid record, wrong location.
        ledger.put_account(Pubkey::new_from_array([0xEE; 32]), acct);
        let (addr, acct) = slot_account(8, "honest", 20);
        ledger.put_account(addr, acct);

        let slots = scan(&ledger, &deriver()).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].content, "honest");
    }

    #[tokio::test]
    async fn malformed_records_are_discarded() {
        let ledger = MockLedger::new();
        let (addr, mut acct) = slot_account(9, "ok", 10);
        acct.data[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        ledger.put_account(addr, acct);
        ledger.put_account(
            Pubkey::new_from_array([1u8; 32]),
            Account::new(1, default_program_id(), vec![1, 2, 3]),
        );

        assert!(scan(&ledger, &deriver()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn refresh_publishes_loaded_state() {
        let ledger = Arc::new(MockLedger::new());
        let (addr, acct) = slot_account(1, "hello", 1);
        ledger.put_account(addr, acct);

        let feed = FeedAggregator::new(ledger, deriver());
        let mut rx = feed.subscribe();
        assert_eq!(*rx.borrow(), FeedState::Idle);

        let snapshot = feed.refresh().await.unwrap().expect("published");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.unique_authors(), 1);
        assert_eq!(snapshot.generation, 1);

        assert!(rx.has_changed().unwrap());
        assert!(matches!(&*rx.borrow_and_update(), FeedState::Loaded(s) if s.len() == 1));
        assert_eq!(feed.snapshot(), Some(snapshot));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_refresh_is_discarded() {
        let ledger = Arc::new(MockLedger::new());
        let old = slot_account(1, "old view", 1);
        let new = slot_account(2, "new view", 2);
        ledger.script_scan(ScanReply {
            delay: Duration::from_millis(500),
            result: Ok(vec![old]),
        });
        ledger.script_scan(ScanReply {
            delay: Duration::from_millis(10),
            result: Ok(vec![new]),
        });

        let feed = FeedAggregator::new(ledger, deriver());
        let (slow, fast) = tokio::join!(feed.refresh(), feed.refresh());

        assert_eq!(slow.unwrap(), None, "older generation must not publish");
        let fast = fast.unwrap().expect("newest generation publishes");
        assert_eq!(fast.generation, 2);

        match feed.state() {
            FeedState::Loaded(s) => {
                assert_eq!(s.generation, 2);
                assert_eq!(s.slots[0].content, "new view");
            }
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn completed_scan_publishes_while_newer_one_is_abandoned() {
        let ledger = Arc::new(MockLedger::new());
        let done = slot_account(1, "finished", 1);
        let never = slot_account(2, "never arrives", 2);
        ledger.script_scan(ScanReply {
            delay: Duration::from_millis(10),
            result: Ok(vec![done]),
        });
        ledger.script_scan(ScanReply {
            delay: Duration::from_secs(60),
            result: Ok(vec![never]),
        });

        let feed = FeedAggregator::new(ledger, deriver());
        let first = feed.refresh();
        let newer = feed.refresh();
        tokio::pin!(first, newer);

        let first = tokio::select! {
            biased;
            res = &mut first => res,
            _ = &mut newer => panic!("slow scan finished first"),
        };
        // `newer` is never polled again.

        let snapshot = first.unwrap().expect("completed scan publishes");
        assert_eq!(snapshot.generation, 1);
        assert_eq!(snapshot.slots[0].content, "finished");
        assert_eq!(feed.snapshot(), Some(snapshot));
        assert!(matches!(feed.state(), FeedState::Loaded(s) if s.generation == 1));
    }

    #[tokio::test]
    async fn failed_scan_keeps_previous_snapshot() {
        let ledger = Arc::new(MockLedger::new());
        let (addr, acct) = slot_account(3, "kept", 5);
        ledger.put_account(addr, acct);
        let feed = FeedAggregator::new(ledger.clone(), deriver());
        let first = feed.refresh().await.unwrap().unwrap();

        ledger.script_scan(ScanReply {
            delay: Duration::ZERO,
            result: Err(ClientError::Transport("down".into())),
        });
        let err = feed.refresh().await.unwrap_err();
        assert_eq!(err, FeedError::Transient("down".into()));
        assert!(matches!(feed.state(), FeedState::Failed(_)));
        assert_eq!(feed.snapshot(), Some(first));
    }

    #[test]
    fn unique_authors_counts_distinct() {
        let a = Keypair::from_seed(&[1u8; 32]).pubkey();
        let slot = |author: Pubkey, ts: i64| Slot {
            address: Pubkey::new_from_array([ts as u8; 32]),
            author,
            content: String::new(),
            timestamp: ts,
        };
        let snapshot = FeedSnapshot {
            slots: vec![slot(a, 1), slot(a, 2)],
            refreshed_at: Utc::now(),
            generation: 1,
        };
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.unique_authors(), 1);
    }
}

//! # TweetSlot Program and Ledger Runtime
//!
//! The ledger side of TweetSlot. Everything here runs where the state
//! lives; clients reach it through the `LedgerClient` trait.
//!
//! - **Accounts**: a [`accounts::WorkingSet`] that buffers writes until the
//!   whole instruction has succeeded.
//! - **Store**: the one-slot-per-author state machine: create, fetch,
//!   delete, with rent deposit and reclaim.
//! - **Program**: decodes tweet instructions and checks the accounts they
//!   name before touching the store.
//! - **Runtime**: the [`runtime::Ledger`]: serialized writes, recent
//!   blockhash window, signature dedupe and committed-event broadcast.
//!
//! ## Design Principles
//!
//! 1. Lamport arithmetic is checked. Rent moves in and out whole.
//! 2. Slot state is derived from account existence, never from a flag.
//! 3. Authorship is checked against the stored record, not the caller's claim.
//! 4. A failed instruction writes nothing but its signature status.

pub mod accounts;
pub mod program;
pub mod runtime;
pub mod store;

pub use program::{ProgramEffect, TweetProgram};
pub use runtime::{Clock, Ledger, LedgerEvent, ManualClock, RuntimeError, SystemClock};
pub use store::{SlotStore, StoreError};

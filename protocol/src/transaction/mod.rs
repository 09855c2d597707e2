//! # Transaction Module
//!
//! Construction, signing and verification of ledger transactions. A tweet
//! transaction carries exactly one instruction for the tweet program.
//!
//! ```text
//! instruction.rs : TweetInstruction codec, AccountMeta, send/delete helpers
//! builder.rs     : Message, Transaction, TransactionBuilder
//! signing.rs     : sign_transaction
//! verification.rs: verify_transaction, TransactionError
//! status.rs      : SignatureStatus recorded per processed signature
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build**: [`TransactionBuilder`] with a recent blockhash.
//! 2. **Sign**: [`sign_transaction`] with the author's keypair.
//! 3. **Submit**: `sendTransaction`; the signature is the id.
//! 4. **Verify**: the ledger runs [`verify_transaction`] and checks the blockhash window.
//! 5. **Status**: the outcome is recorded as a [`SignatureStatus`].

pub mod builder;
pub mod instruction;
pub mod signing;
pub mod status;
pub mod verification;

pub use builder::{Message, Transaction, TransactionBuilder};
pub use instruction::{AccountMeta, Instruction, TweetInstruction};
pub use signing::sign_transaction;
pub use status::SignatureStatus;
pub use verification::{verify_transaction, TransactionError};

//! # Cryptographic Primitives
//!
//! Thin, type-safe wrappers around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for author identities and transaction
//!   signatures.
//! - **Curve25519** point decompression (`curve25519-dalek`) to keep
//!   derived addresses off the curve.
//! - **SHA-256** for everything in the wire and record formats.
//! - **BLAKE3** for ledger-internal fingerprints.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, discriminator, hashv, sha256};
pub use keys::{KeyError, Keypair, Pubkey, Signature};

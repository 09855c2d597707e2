//! # Protocol Configuration & Constants
//!
//! Every magic number in TweetSlot lives here. The record layout constants
//! are part of the on-ledger format: changing them orphans every slot that
//! already exists.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::crypto::keys::Pubkey;

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Crate/protocol version reported by `/status` and `version`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version byte carried in every transaction message.
pub const MESSAGE_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Namespace tag mixed into every slot address.
pub const TWEET_SEED: &[u8] = b"tweet";

/// Marker appended to the derivation preimage so derived addresses can never
/// collide with hashes used for anything else.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds in one derivation.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Program id of the tweet program, base58.
pub const DEFAULT_PROGRAM_ID: &str = "4iRSVdRWZBJiokynBtsReFyBZ8epDy2E8a9XRk3jEY1N";

/// The system program owns plain lamport-holding accounts.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

/// Parsed [`DEFAULT_PROGRAM_ID`].
pub fn default_program_id() -> Pubkey {
    // The constant is checked by `default_program_id_parses` below.
    DEFAULT_PROGRAM_ID.parse().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Record layout
// ---------------------------------------------------------------------------

/// Maximum post length in Unicode scalar values.
pub const MAX_CONTENT_CHARS: usize = 250;

pub const DISCRIMINATOR_LENGTH: usize = 8;
pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const TIMESTAMP_LENGTH: usize = 8;
/// `u32` little-endian byte-length prefix ahead of the content bytes.
pub const STRING_LENGTH_PREFIX: usize = 4;
/// Worst case UTF-8: four bytes per scalar value.
pub const MAX_CONTENT_BYTES: usize = MAX_CONTENT_CHARS * 4;

/// Fixed account size allocated for every slot.
pub const TWEET_ACCOUNT_SPACE: usize = DISCRIMINATOR_LENGTH
    + PUBLIC_KEY_LENGTH
    + TIMESTAMP_LENGTH
    + STRING_LENGTH_PREFIX
    + MAX_CONTENT_BYTES;

// ---------------------------------------------------------------------------
// Rent
// ---------------------------------------------------------------------------

/// Smallest lamport unit per whole token.
pub const LAMPORTS_PER_TOKEN: u64 = 1_000_000_000;

/// Bytes charged on top of the data length for every account.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

pub const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

pub const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Deposit that must be locked in an account of `space` bytes. Refunded in
/// full when the account is closed.
pub const fn rent_exempt_minimum(space: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + space as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

/// Lamports handed out by one `requestAirdrop` when the caller does not say.
pub const DEFAULT_AIRDROP_LAMPORTS: u64 = 2 * LAMPORTS_PER_TOKEN;

// ---------------------------------------------------------------------------
// Ledger timing
// ---------------------------------------------------------------------------

/// How many recent blockhashes a transaction may reference.
pub const MAX_RECENT_BLOCKHASHES: usize = 150;

/// Slot duration of the local ledger.
pub const SLOT_TIME: Duration = Duration::from_millis(400);

// ---------------------------------------------------------------------------
// Client timing
// ---------------------------------------------------------------------------

/// How long a submitter waits for a signature to reach a final status.
pub const CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

/// Interval between signature status polls.
pub const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Submission attempts for one signed transaction after transient failures.
pub const MAX_SUBMIT_RETRIES: u32 = 3;

/// Per-request HTTP timeout of the RPC client.
pub const RPC_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub const DEFAULT_RPC_PORT: u16 = 8899;

pub const DEFAULT_METRICS_PORT: u16 = 8999;

/// Which ledger endpoint a collaborator talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cluster {
    /// A `tweetslot-node run` on this machine.
    Localnet,
    /// Any other JSON-RPC endpoint.
    Custom(String),
}

impl Cluster {
    /// The JSON-RPC URL for this cluster.
    pub fn rpc_url(&self) -> String {
        match self {
            Cluster::Localnet => format!("http://127.0.0.1:{}/rpc", DEFAULT_RPC_PORT),
            Cluster::Custom(url) => url.clone(),
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Cluster::Localnet
    }
}

impl FromStr for Cluster {
    type Err = String;

    /// Accepts `localnet` / `localhost` or an `http(s)://` URL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(Cluster::Custom(url.to_string()))
            }
            other => Err(format!("unknown cluster: {other}")),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cluster::Localnet => write!(f, "localnet"),
            Cluster::Custom(url) => write!(f, "{url}"),
        }
    }
}

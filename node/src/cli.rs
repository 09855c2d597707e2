//! # CLI Interface
//!
//! Command-line structure for `tweetslot-node`, via `clap` derive. One
//! binary plays both roles: `run` hosts the local ledger, and the remaining
//! subcommands are a collaborator talking to a ledger over JSON-RPC.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tweetslot_protocol::config::{
    Cluster, DEFAULT_AIRDROP_LAMPORTS, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT,
};

use crate::logging::LogFormat;

/// TweetSlot node and collaborator.
///
/// Every author owns exactly one slot holding one short post. `run` starts
/// a single-node ledger with the tweet program; the other subcommands send,
/// delete and read slots against any ledger endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "tweetslot-node",
    about = "TweetSlot ledger node and collaborator",
    version,
    propagate_version = true
)]
pub struct TweetSlotCli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty, env = "TWEETSLOT_LOG_FORMAT")]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the local ledger node.
    Run(RunArgs),
    /// Generate a new author keypair file.
    Keygen(KeygenArgs),
    /// Fund an identity on the ledger.
    Airdrop(AirdropArgs),
    /// Publish content into your slot.
    Send(SendArgs),
    /// Delete your slot and reclaim its rent.
    Delete(ClientArgs),
    /// Print every live slot, newest first.
    Feed(ClientArgs),
    /// Print a single author's slot.
    Show(ShowArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database. Created on first run.
    #[arg(long, short = 'd', env = "TWEETSLOT_DATA_DIR", default_value = ".tweetslot")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC, status and WebSocket API.
    #[arg(long, env = "TWEETSLOT_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TWEETSLOT_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Address to bind both listeners to.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Tweet program id, base58. Defaults to the built-in program id.
    #[arg(long, env = "TWEETSLOT_PROGRAM_ID")]
    pub program_id: Option<String>,

    /// Milliseconds between slots.
    #[arg(long, default_value_t = 400)]
    pub slot_ms: u64,
}

/// Arguments for the `keygen` subcommand.
#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret key.
    #[arg(long, short = 'o', env = "TWEETSLOT_KEYPAIR", default_value = "tweetslot-keypair.hex")]
    pub outfile: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

/// Connection and identity shared by every collaborator subcommand.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// `localnet` or a full JSON-RPC URL.
    #[arg(long, short = 'u', env = "TWEETSLOT_RPC_URL", default_value = "localnet")]
    pub url: Cluster,

    /// Hex-encoded secret key file.
    #[arg(long, short = 'k', env = "TWEETSLOT_KEYPAIR", default_value = "tweetslot-keypair.hex")]
    pub keypair: PathBuf,

    /// Tweet program id, base58. Defaults to the built-in program id.
    #[arg(long, env = "TWEETSLOT_PROGRAM_ID")]
    pub program_id: Option<String>,
}

/// Arguments for the `airdrop` subcommand.
#[derive(Args, Debug)]
pub struct AirdropArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Lamports to request.
    #[arg(long, default_value_t = DEFAULT_AIRDROP_LAMPORTS)]
    pub lamports: u64,

    /// Recipient, base58. Defaults to the keypair's own identity.
    #[arg(long)]
    pub to: Option<String>,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Post content, at most 250 characters.
    pub content: String,
}

/// Arguments for the `show` subcommand.
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub client: ClientArgs,

    /// Author whose slot to show, base58. Defaults to your own.
    pub author: Option<String>,
}

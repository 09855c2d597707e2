// Copyright (c) 2026 TweetSlot Contributors. MIT License.
// See LICENSE for details.

//! # TweetSlot Node
//!
//! Entry point for the `tweetslot-node` binary.
//!
//! - `run`    : host a single-node ledger with the tweet program
//! - `keygen` : write a fresh author key file
//! - `airdrop`: fund an identity
//! - `send`   : publish into your slot
//! - `delete` : vacate your slot and reclaim its rent
//! - `feed`   : print every live slot, newest first
//! - `show`   : print one author's slot
//! - `version`: print build information

mod api;
mod cli;
mod keyfile;
mod logging;
mod metrics;
mod rpc_client;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use tweetslot_contracts::{Ledger, SystemClock};
use tweetslot_protocol::client::SubmitterConfig;
use tweetslot_protocol::config::{default_program_id, PROTOCOL_VERSION};
use tweetslot_protocol::crypto::{Keypair, Pubkey};
use tweetslot_protocol::error::SlotError;
use tweetslot_protocol::record::Slot;
use tweetslot_protocol::storage::LedgerDb;
use tweetslot_protocol::{Session, TweetClient};

use cli::{ClientArgs, Commands, TweetSlotCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use rpc_client::RpcLedgerClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TweetSlotCli::parse();
    let format = LogFormat::from(cli.log_format);

    match cli.command {
        Commands::Run(args) => {
            logging::init_logging(logging::NODE_FILTER, format);
            run_node(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
        command => {
            logging::init_logging(logging::CLIENT_FILTER, format);
            run_client(command).await
        }
    }
}

fn parse_program_id(raw: Option<&str>) -> Result<Pubkey> {
    match raw {
        Some(s) => s.parse().with_context(|| format!("invalid program id {s:?}")),
        None => Ok(default_program_id()),
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

async fn run_node(args: cli::RunArgs) -> Result<()> {
    let program_id = parse_program_id(args.program_id.as_deref())?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        program = %program_id,
        "starting tweetslot-node"
    );

    let db_path = args.data_dir.join("ledger");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create ledger directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open ledger at {}", db_path.display()))?;

    let ledger = Arc::new(
        Ledger::open(db, program_id, Arc::new(SystemClock)).context("failed to initialize ledger")?,
    );
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    let app_state = api::AppState {
        version: format!("{} (protocol {})", env!("CARGO_PKG_VERSION"), PROTOCOL_VERSION),
        ledger: Arc::clone(&ledger),
        metrics: node_metrics,
    };

    let api_addr = format!("{}:{}", args.bind, args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {api_addr}"))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    let metrics_addr = format!("{}:{}", args.bind, args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {metrics_addr}"))?;
    tracing::info!("metrics server listening on {}", metrics_addr);

    let ticker = ledger.spawn_slot_ticker(Duration::from_millis(args.slot_ms.max(1)));

    tokio::select! {
        res = axum::serve(api_listener, api::create_router(app_state.clone())) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "API server error");
            }
        }
        res = axum::serve(metrics_listener, api::create_metrics_router(app_state)) => {
            if let Err(e) = res {
                tracing::error!(error = %e, "metrics server error");
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    ticker.abort();
    ledger.db().flush().context("failed to flush ledger")?;
    tracing::info!("tweetslot-node stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Collaborator
// ---------------------------------------------------------------------------

struct Collaborator {
    client: TweetClient,
    session: Session,
}

impl Collaborator {
    fn connect(args: &ClientArgs) -> Result<Self> {
        let keypair = keyfile::read_keypair(&args.keypair)?;
        let program_id = parse_program_id(args.program_id.as_deref())?;
        let session = Session::new(keypair, args.url.clone()).with_program_id(program_id);

        let transport = RpcLedgerClient::new(args.url.rpc_url());
        tracing::debug!(url = transport.url(), author = %session.author(), "connecting");
        let client = TweetClient::new(Arc::new(transport), SubmitterConfig::default());
        Ok(Self { client, session })
    }
}

async fn run_client(command: Commands) -> Result<()> {
    match command {
        Commands::Keygen(args) => {
            let keypair = Keypair::generate();
            keyfile::write_keypair(&args.outfile, &keypair, args.force)?;
            println!("Wrote {}", args.outfile.display());
            println!("Author: {}", keypair.pubkey());
        }
        Commands::Airdrop(args) => {
            let c = Collaborator::connect(&args.client)?;
            let to = match args.to.as_deref() {
                Some(raw) => raw.parse().with_context(|| format!("invalid recipient {raw:?}"))?,
                None => c.session.author(),
            };
            let signature = c.client.airdrop(&to, args.lamports).await?;
            let balance = c.client.balance(&to).await?;
            println!("Airdropped {} lamports to {to}", args.lamports);
            println!("Balance:   {balance}");
            println!("Signature: {signature}");
        }
        Commands::Send(args) => {
            let c = Collaborator::connect(&args.client)?;
            let address = c
                .client
                .send(&c.session, &args.content)
                .await
                .map_err(report_unknown_outcome)?;
            println!("Sent to slot {address}");
        }
        Commands::Delete(args) => {
            let c = Collaborator::connect(&args)?;
            c.client
                .delete(&c.session)
                .await
                .map_err(report_unknown_outcome)?;
            println!("Deleted slot of {}", c.session.author());
        }
        Commands::Feed(args) => {
            let c = Collaborator::connect(&args)?;
            let slots = c.client.fetch_all(&c.session).await?;
            if slots.is_empty() {
                println!("No tweets yet.");
            }
            for slot in &slots {
                print_slot(slot);
            }
        }
        Commands::Show(args) => {
            let c = Collaborator::connect(&args.client)?;
            let author = match args.author.as_deref() {
                Some(raw) => raw.parse().with_context(|| format!("invalid author {raw:?}"))?,
                None => c.session.author(),
            };
            let slot = c.client.fetch_by_author(&c.session, &author).await?;
            print_slot(&slot);
        }
        Commands::Run(_) | Commands::Version => unreachable!("handled in main"),
    }
    Ok(())
}

/// Names the in-flight request when a write may or may not have landed.
fn report_unknown_outcome(err: SlotError) -> anyhow::Error {
    match err.signature() {
        Some(signature) => anyhow!(
            "{err}; signature {signature} may still commit, check its status before retrying"
        ),
        None => err.into(),
    }
}

fn print_slot(slot: &Slot) {
    let when = chrono::DateTime::from_timestamp(slot.timestamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| slot.timestamp.to_string());
    println!("{}  {}", when, slot.author);
    println!("    {}", slot.content);
    println!("    slot {}", slot.address);
}

// ---------------------------------------------------------------------------
// Misc
// ---------------------------------------------------------------------------

fn print_version() {
    println!("tweetslot-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol       {}", PROTOCOL_VERSION);
    println!("program        {}", default_program_id());
}

/// Waits for SIGINT or SIGTERM. Only Ctrl+C on non-Unix platforms.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

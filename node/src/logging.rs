//! # Structured Logging
//!
//! Sets up the `tracing` subscriber. Output goes to stderr so that stdout
//! stays clean for command results (`feed`, `show`, `keygen` print there).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, colored.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Default filter for the node when `RUST_LOG` is unset.
pub const NODE_FILTER: &str = "tweetslot_node=info,tweetslot_contracts=info,tweetslot_protocol=info,tower_http=info";

/// Default filter for collaborator subcommands: quiet unless something
/// goes wrong.
pub const CLIENT_FILTER: &str = "tweetslot_node=warn,tweetslot_protocol=warn";

/// Install the global subscriber. Call once, early in `main()`.
///
/// `RUST_LOG` overrides `default_filter` when set, using `EnvFilter`
/// directive syntax:
///
/// ```text
/// RUST_LOG=tweetslot_contracts=debug,tweetslot_protocol=debug
/// ```
pub fn init_logging(default_filter: &str, format: LogFormat) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
                .init();
        }
    }

    tracing::debug!(?format, "logging initialized");
}

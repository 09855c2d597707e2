//! # Prometheus Metrics
//!
//! Node metrics, served at `/metrics` on the metrics port. Everything lives
//! in a dedicated [`Registry`] under the `tweetslot` namespace.
//!
//! Counters and the commit histogram are updated by the RPC handler as
//! transactions are processed. Gauges that mirror ledger state are
//! refreshed from the ledger on every scrape.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use crate::api::AppState;

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Transactions committed with an applied status.
    pub transactions_processed_total: IntCounter,
    /// Transactions rejected by verification, the blockhash window or the program.
    pub transactions_rejected_total: IntCounter,
    /// Airdrops granted.
    pub airdrops_total: IntCounter,
    /// Occupied slots.
    pub live_tweets: IntGauge,
    pub current_slot: IntGauge,
    /// Time from receiving a transaction to its commit, in seconds.
    pub commit_latency_seconds: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tweetslot".into()), None)?;

        let transactions_processed_total = IntCounter::new(
            "transactions_processed_total",
            "Transactions committed by the ledger",
        )?;
        registry.register(Box::new(transactions_processed_total.clone()))?;

        let transactions_rejected_total = IntCounter::new(
            "transactions_rejected_total",
            "Transactions rejected by the ledger",
        )?;
        registry.register(Box::new(transactions_rejected_total.clone()))?;

        let airdrops_total = IntCounter::new("airdrops_total", "Airdrops granted")?;
        registry.register(Box::new(airdrops_total.clone()))?;

        let live_tweets = IntGauge::new("live_tweets", "Occupied tweet slots")?;
        registry.register(Box::new(live_tweets.clone()))?;

        let current_slot = IntGauge::new("current_slot", "Latest ledger slot")?;
        registry.register(Box::new(current_slot.clone()))?;

        let commit_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "commit_latency_seconds",
                "Transaction processing latency in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        )?;
        registry.register(Box::new(commit_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            transactions_processed_total,
            transactions_rejected_total,
            airdrops_total,
            live_tweets,
            current_slot,
            commit_latency_seconds,
        })
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics`.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = &state.metrics;
    metrics.current_slot.set(state.ledger.slot() as i64);
    match state.ledger.tweet_count() {
        Ok(count) => metrics.live_tweets.set(count as i64),
        Err(e) => tracing::warn!(error = %e, "could not count live tweets"),
    }

    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_lists_every_metric() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.transactions_processed_total.inc();
        metrics.commit_latency_seconds.observe(0.002);

        let text = metrics.encode().unwrap();
        for name in [
            "tweetslot_transactions_processed_total 1",
            "tweetslot_transactions_rejected_total 0",
            "tweetslot_live_tweets",
            "tweetslot_current_slot",
            "tweetslot_commit_latency_seconds_bucket",
        ] {
            assert!(text.contains(name), "missing {name}");
        }
    }
}

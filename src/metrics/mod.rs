//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Chain connection status
//! - Swap lifecycle transitions and outcomes
//! - Quote and indexer results
//! - Polling activity

use crate::error::{SwapError, SwapResult};
use crate::models::SwapStatus;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, register_histogram_vec, Counter,
    CounterVec, Encoder, GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Chain metrics
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "bridge_swap_chain_connected",
        "Chain connection status (1=connected, 0=disconnected)",
        &["chain_id"]
    ).unwrap();

    // Swap metrics
    pub static ref SWAPS_CREATED: CounterVec = register_counter_vec!(
        "bridge_swap_swaps_created_total",
        "Total swaps created by route",
        &["chain_from", "chain_to"]
    ).unwrap();

    pub static ref SWAP_TRANSITIONS: CounterVec = register_counter_vec!(
        "bridge_swap_transitions_total",
        "Total swap status transitions",
        &["from", "to"]
    ).unwrap();

    pub static ref SWAPS_FINISHED: CounterVec = register_counter_vec!(
        "bridge_swap_swaps_finished_total",
        "Total swaps reaching a terminal status",
        &["status"]
    ).unwrap();

    pub static ref SWAP_DURATION: HistogramVec = register_histogram_vec!(
        "bridge_swap_duration_seconds",
        "Time from swap creation to terminal status",
        &["status"],
        vec![30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0, 86400.0]
    ).unwrap();

    pub static ref SENDS_SUBMITTED: CounterVec = register_counter_vec!(
        "bridge_swap_sends_submitted_total",
        "Total bridge send transactions submitted",
        &["chain"]
    ).unwrap();

    // Quote and indexer metrics
    pub static ref QUOTES: CounterVec = register_counter_vec!(
        "bridge_swap_quotes_total",
        "Total quote requests by result",
        &["result"]
    ).unwrap();

    pub static ref INDEXER_QUERIES: CounterVec = register_counter_vec!(
        "bridge_swap_indexer_queries_total",
        "Total indexer queries by chain and result",
        &["chain", "result"]
    ).unwrap();

    // Polling metrics
    pub static ref POLL_ATTEMPTS: Counter = register_counter!(
        "bridge_swap_poll_attempts_total",
        "Total polling attempts"
    ).unwrap();

    pub static ref BALANCE_REFRESHES: Counter = register_counter!(
        "bridge_swap_balance_refreshes_total",
        "Total balance refresh requests"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> SwapResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SwapError::Internal(format!("Metrics bind failed: {}", e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| SwapError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn render() -> SwapResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| SwapError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| SwapError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_chain_health(chain_id: u64, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[&chain_id.to_string()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_swap_created(chain_from: &str, chain_to: &str) {
    SWAPS_CREATED.with_label_values(&[chain_from, chain_to]).inc();
}

pub fn record_transition(from: SwapStatus, to: SwapStatus) {
    SWAP_TRANSITIONS
        .with_label_values(&[from.as_str(), to.as_str()])
        .inc();
}

pub fn record_terminal(status: SwapStatus, duration_secs: Option<f64>) {
    SWAPS_FINISHED.with_label_values(&[status.as_str()]).inc();
    if let Some(secs) = duration_secs {
        SWAP_DURATION
            .with_label_values(&[status.as_str()])
            .observe(secs);
    }
}

pub fn record_send_submitted(chain: &str) {
    SENDS_SUBMITTED.with_label_values(&[chain]).inc();
}

pub fn record_quote(result: &str) {
    QUOTES.with_label_values(&[result]).inc();
}

pub fn record_indexer_query(chain: &str, result: &str) {
    INDEXER_QUERIES.with_label_values(&[chain, result]).inc();
}

pub fn record_poll_attempt() {
    POLL_ATTEMPTS.inc();
}

pub fn record_balance_refresh() {
    BALANCE_REFRESHES.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_metrics_are_rendered() {
        record_transition(SwapStatus::SendPending, SwapStatus::DestinationPending);
        record_terminal(SwapStatus::Success, Some(42.0));
        record_indexer_query("polygon", "found");

        let text = render().unwrap();
        assert!(text.contains("bridge_swap_transitions_total"));
        assert!(text.contains("to=\"DESTINATION_PENDING\""));
        assert!(text.contains("bridge_swap_duration_seconds"));
    }
}

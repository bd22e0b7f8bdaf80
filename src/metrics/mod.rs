//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Status and lock polls per chain
//! - Terminal outcomes of crosschain transactions
//! - Lock-wait diagnostics
//! - Chain connection status

use crate::error::{TrackerError, TrackerResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref CHAIN_CONNECTED: GaugeVec = register_gauge_vec!(
        "crosschain_chain_connected",
        "Chain connection status (1=connected, 0=disconnected)",
        &["chain_id"]
    ).unwrap();

    pub static ref STATUS_POLLS: CounterVec = register_counter_vec!(
        "crosschain_status_polls_total",
        "Coordination contract status queries",
        &["chain_id"]
    ).unwrap();

    pub static ref LOCK_POLLS: CounterVec = register_counter_vec!(
        "crosschain_lock_polls_total",
        "Contract lock queries",
        &["chain_id"]
    ).unwrap();

    pub static ref OUTCOMES: CounterVec = register_counter_vec!(
        "crosschain_transaction_outcomes_total",
        "Crosschain transactions by final outcome",
        &["chain_id", "outcome"]
    ).unwrap();

    pub static ref LOCK_DIAGNOSTICS: CounterVec = register_counter_vec!(
        "crosschain_lock_wait_exceeded_total",
        "Lock waits that went past the configured poll budget",
        &["chain_id"]
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

    pub async fn run(&self) -> TrackerResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TrackerError::Config(format!("Cannot bind metrics port {}: {}", self.port, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| TrackerError::Config(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

// Helper functions to record metrics

pub fn record_chain_health(chain_id: u64, healthy: bool) {
    CHAIN_CONNECTED
        .with_label_values(&[&chain_id.to_string()])
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_status_poll(chain_id: u64) {
    STATUS_POLLS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_lock_poll(chain_id: u64) {
    LOCK_POLLS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

pub fn record_outcome(chain_id: u64, outcome: &str) {
    OUTCOMES
        .with_label_values(&[&chain_id.to_string(), outcome])
        .inc();
}

pub fn record_lock_diagnostic(chain_id: u64) {
    LOCK_DIAGNOSTICS
        .with_label_values(&[&chain_id.to_string()])
        .inc();
}

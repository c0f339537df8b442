//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Transaction submissions and rejections per entry point
//! - Speculative execution outcomes
//! - Mining triggers, failures and sealed blocks

use crate::error::{NodeError, NodeResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Submission metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "instamine_transactions_submitted_total",
        "Total transactions admitted to the pool",
        &["path"]
    ).unwrap();

    pub static ref TX_REJECTED: CounterVec = register_counter_vec!(
        "instamine_transactions_rejected_total",
        "Total submissions rejected before admission",
        &["path", "reason"]
    ).unwrap();

    pub static ref SUBMISSION_LATENCY: HistogramVec = register_histogram_vec!(
        "instamine_submission_latency_seconds",
        "Submission latency including the mining decision",
        &["path"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    // Acceleration metrics
    pub static ref SPECULATIVE_EXECUTIONS: CounterVec = register_counter_vec!(
        "instamine_speculative_executions_total",
        "Total dry runs by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref MINE_TRIGGERS: CounterVec = register_counter_vec!(
        "instamine_mine_triggers_total",
        "Total instant-mine requests issued",
        &[]
    ).unwrap();

    pub static ref MINE_TRIGGER_FAILURES: CounterVec = register_counter_vec!(
        "instamine_mine_trigger_failures_total",
        "Total failed instant-mine attempts by stage",
        &["stage"]
    ).unwrap();

    pub static ref BLOCKS_SEALED: CounterVec = register_counter_vec!(
        "instamine_blocks_sealed_total",
        "Total blocks sealed",
        &[]
    ).unwrap();

    pub static ref TX_MINED: CounterVec = register_counter_vec!(
        "instamine_transactions_mined_total",
        "Total transactions included in sealed blocks",
        &[]
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

    pub async fn run(&self) -> NodeResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| NodeError::Internal(format!("metrics bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| NodeError::Internal(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_tx_submitted(path: &str) {
    TX_SUBMITTED.with_label_values(&[path]).inc();
}

pub fn record_tx_rejected(path: &str, error: &NodeError) {
    TX_REJECTED
        .with_label_values(&[path, error.label()])
        .inc();
}

pub fn record_submission_latency(path: &str, latency_secs: f64) {
    SUBMISSION_LATENCY
        .with_label_values(&[path])
        .observe(latency_secs);
}

pub fn record_speculative_execution(outcome: &str) {
    SPECULATIVE_EXECUTIONS.with_label_values(&[outcome]).inc();
}

pub fn record_mine_triggered() {
    MINE_TRIGGERS.with_label_values(&[]).inc();
}

pub fn record_mine_trigger_failure(stage: &str) {
    MINE_TRIGGER_FAILURES.with_label_values(&[stage]).inc();
}

pub fn record_block_sealed(transactions: usize) {
    BLOCKS_SEALED.with_label_values(&[]).inc();
    TX_MINED.with_label_values(&[]).inc_by(transactions as f64);
}

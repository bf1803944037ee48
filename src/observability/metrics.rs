//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resolver_evaluations_total` (counter): evaluations by `outcome`
//! - `resolver_rewrite_loops_total` (counter): rewrite chains cut at the depth limit
//! - `resolver_config_reloads_total` (counter): reloads by `result`
//! - `edge_upstream_duration_seconds` (histogram): forwarded request latency by `target`
//! - `edge_upstream_errors_total` (counter): failed forwards by `target`

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;

pub const EVALUATIONS_TOTAL: &str = "resolver_evaluations_total";
pub const REWRITE_LOOPS_TOTAL: &str = "resolver_rewrite_loops_total";
pub const CONFIG_RELOADS_TOTAL: &str = "resolver_config_reloads_total";
pub const UPSTREAM_DURATION_SECONDS: &str = "edge_upstream_duration_seconds";
pub const UPSTREAM_ERRORS_TOTAL: &str = "edge_upstream_errors_total";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metrics listen address `{0}`")]
    Address(String),

    #[error("failed to install prometheus exporter: {0}")]
    Install(#[from] metrics_exporter_prometheus::BuildError),
}

/// Start the Prometheus exporter on `listen`.
pub fn init_prometheus(listen: &str) -> Result<SocketAddr, MetricsError> {
    let addr: SocketAddr = listen
        .parse()
        .map_err(|_| MetricsError::Address(listen.to_string()))?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    Ok(addr)
}

#[inline]
pub fn record_evaluation(outcome: &'static str) {
    counter!(EVALUATIONS_TOTAL, "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_rewrite_loop() {
    counter!(REWRITE_LOOPS_TOTAL).increment(1);
}

/// `success` is false when the new file failed to load or validate.
#[inline]
pub fn record_config_reload(success: bool) {
    let result = if success { "success" } else { "error" };
    counter!(CONFIG_RELOADS_TOTAL, "result" => result).increment(1);
}

#[inline]
pub fn record_upstream(target: &'static str, start: Instant) {
    histogram!(UPSTREAM_DURATION_SECONDS, "target" => target).record(start.elapsed().as_secs_f64());
}

#[inline]
pub fn record_upstream_error(target: &'static str) {
    counter!(UPSTREAM_ERRORS_TOTAL, "target" => target).increment(1);
}

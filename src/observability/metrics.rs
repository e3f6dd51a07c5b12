//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reqlens_requests_total` (counter): intercepted requests by method, status
//! - `reqlens_request_duration_seconds` (histogram): latency distribution
//! - `reqlens_log_appends_total` (counter): records written, by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels kept low-cardinality (no paths)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one intercepted request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "reqlens_requests_total",
        "method" => method.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!("reqlens_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record the outcome of a log append.
pub fn record_append(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("reqlens_log_appends_total", "outcome" => outcome).increment(1);
}

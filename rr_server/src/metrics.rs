//! Prometheus metrics for the escrow server.
//!
//! Metrics are exposed in Prometheus text format on a separate listener
//! when `METRICS_BIND` is configured. Without an installed exporter every
//! recording function is a no-op.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use rr_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/api/v1/races", 201);
//! metrics::races_created_total();
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request with method, route and status labels.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

// ============================================================================
// Escrow Metrics
// ============================================================================

pub fn races_created_total() {
    metrics::counter!("races_created_total").increment(1);
}

pub fn race_joins_total() {
    metrics::counter!("race_joins_total").increment(1);
}

pub fn races_finalized_total() {
    metrics::counter!("races_finalized_total").increment(1);
}

pub fn withdrawals_total() {
    metrics::counter!("withdrawals_total").increment(1);
}

/// Increment rejected escrow operations, labelled by error code.
pub fn escrow_errors_total(code: &'static str) {
    metrics::counter!("escrow_errors_total", "code" => code).increment(1);
}

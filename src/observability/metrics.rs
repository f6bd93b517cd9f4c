//! Metrics collection and exposition.
//!
//! # Metrics
//! - `optional_tls_handshakes_total` (counter): server handshakes by `path`
//!   (`tls`, `plaintext`, `indeterminate`) and `outcome` (`accepted`, `rejected`)
//! - `optional_tls_connections_total` (counter): accepted TCP connections
//! - `optional_tls_policy_changes_total` (counter): runtime policy flips

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_handshake(path: &'static str, accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("optional_tls_handshakes_total", "path" => path, "outcome" => outcome)
        .increment(1);
}

pub fn record_connection() {
    metrics::counter!("optional_tls_connections_total").increment(1);
}

pub fn record_policy_change(tls_required: bool) {
    let mode = if tls_required { "required" } else { "optional" };
    metrics::counter!("optional_tls_policy_changes_total", "mode" => mode).increment(1);
}

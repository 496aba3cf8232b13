//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_sessions_total` (counter): accepted sessions by request kind
//! - `proxy_sessions_active` (gauge): live session count
//! - `proxy_session_errors_total` (counter): failed sessions by error kind
//! - `proxy_bytes_relayed_total` (counter): relayed bytes by direction
//! - `proxy_upstream_connect_seconds` (histogram): connect latency
//!
//! Without an installed recorder every call here is a no-op, which is what
//! unit and integration tests rely on.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn session_opened() {
    gauge!("proxy_sessions_active").increment(1.0);
}

pub fn session_closed() {
    gauge!("proxy_sessions_active").decrement(1.0);
}

/// Count a session once its request kind is known.
pub fn record_session(kind: &'static str) {
    counter!("proxy_sessions_total", "kind" => kind).increment(1);
}

pub fn record_session_error(kind: &'static str) {
    counter!("proxy_session_errors_total", "kind" => kind).increment(1);
}

pub fn record_bytes_relayed(direction: &'static str, bytes: u64) {
    counter!("proxy_bytes_relayed_total", "direction" => direction).increment(bytes);
}

pub fn record_upstream_connect(elapsed: Duration) {
    histogram!("proxy_upstream_connect_seconds").record(elapsed.as_secs_f64());
}

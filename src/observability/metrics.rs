//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cache_lookups_total` (counter): cache reads by result (hit, miss)
//! - `cache_evictions_total` (counter): expired entries removed
//! - `cache_entries` (gauge): stored entries, expired ones included
//! - `http_request_attempts_total` (counter): physical attempts by outcome
//! - `http_requests_total` (counter): logical requests by outcome
//! - `channel_connections_total` (counter): connection attempts by outcome
//! - `channel_reconnects_scheduled_total` (counter): automatic reconnections
//! - `channel_messages_total` (counter): inbound frames by kind (json, raw)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_evictions(count: usize) {
    counter!("cache_evictions_total").increment(count as u64);
}

pub fn record_cache_size(size: usize) {
    gauge!("cache_entries").set(size as f64);
}

/// Record a single physical HTTP attempt.
pub fn record_request_attempt(outcome: &'static str) {
    counter!("http_request_attempts_total", "outcome" => outcome).increment(1);
}

/// Record the final result of a logical request.
pub fn record_request(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("http_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_channel_connection(opened: bool) {
    let outcome = if opened { "opened" } else { "failed" };
    counter!("channel_connections_total", "outcome" => outcome).increment(1);
}

pub fn record_channel_reconnect_scheduled() {
    counter!("channel_reconnects_scheduled_total").increment(1);
}

pub fn record_channel_message(kind: &'static str) {
    counter!("channel_messages_total", "kind" => kind).increment(1);
}

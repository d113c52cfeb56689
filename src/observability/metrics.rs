//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): outer requests by path kind, status
//! - `gateway_request_duration_seconds` (histogram): outer request latency
//! - `gateway_forward_retries_total` (counter): retried forwarding attempts
//! - `gateway_fallback_total` (counter): no-frame requests by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished outer request.
pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    histogram!("gateway_request_duration_seconds", "kind" => kind).record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("gateway_forward_retries_total").increment(1);
}

pub fn record_fallback(outcome: &'static str) {
    counter!("gateway_fallback_total", "outcome" => outcome).increment(1);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded requests by route, status
//! - `proxy_request_duration_seconds` (histogram): upstream latency by route
//! - `proxy_reloads_total` (counter): reconciliations by route file, outcome
//! - `proxy_active_routes` (gauge): handlers currently installed, by route file
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op, so library users pay nothing by default
//! - Labels are route context, status code and route file path, never request paths
//! - Reload metrics carry a `source` label (the route file) so several
//!   hot-reload instances in one process keep separate series

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_reload(source: &str, outcome: &'static str) {
    metrics::counter!(
        "proxy_reloads_total",
        "source" => source.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn set_active_routes(source: &str, count: usize) {
    metrics::gauge!("proxy_active_routes", "source" => source.to_string()).set(count as f64);
}

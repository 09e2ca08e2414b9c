//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dashboard_probes_total` (counter): settled probes by layer, verdict
//! - `dashboard_probe_duration_seconds` (histogram): probe latency by layer
//! - `dashboard_service_health` (gauge): 1=healthy, 0=unhealthy, -1=unknown
//! - `dashboard_monitored_services` (gauge): services with a live monitor
//! - `dashboard_refresh_failures_total` (counter): failed fetches by source
//! - `dashboard_validations_total` (counter): remote validation calls by outcome

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::verdict::{Layer, Verdict};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_probe(layer: Layer, verdict: Verdict, elapsed: Duration) {
    metrics::counter!(
        "dashboard_probes_total",
        "layer" => layer.as_str(),
        "verdict" => verdict.to_string()
    )
    .increment(1);
    metrics::histogram!("dashboard_probe_duration_seconds", "layer" => layer.as_str())
        .record(elapsed.as_secs_f64());
}

pub fn record_service_health(service: &str, layer: Layer, verdict: Verdict) {
    metrics::gauge!(
        "dashboard_service_health",
        "service" => service.to_string(),
        "layer" => layer.as_str()
    )
    .set(verdict.gauge_value());
}

/// Reset both layer gauges of a service that is no longer monitored.
pub fn clear_service_health(service: &str) {
    for layer in [Layer::Proxy, Layer::Target] {
        record_service_health(service, layer, Verdict::Unknown);
    }
}

pub fn record_monitored_services(count: usize) {
    metrics::gauge!("dashboard_monitored_services").set(count as f64);
}

pub fn record_refresh_failure(source: &'static str) {
    metrics::counter!("dashboard_refresh_failures_total", "source" => source).increment(1);
}

pub fn record_validation(outcome: &'static str) {
    metrics::counter!("dashboard_validations_total", "outcome" => outcome).increment(1);
}

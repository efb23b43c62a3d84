//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pilot_probes_total` (counter): probes by classification
//! - `pilot_probe_latency_seconds` (histogram): probe latency
//! - `pilot_plan_steps_total` (counter): plan steps by kind and outcome
//! - `pilot_selections_total` (counter): selections by strategy and outcome
//! - `pilot_backend_ready` (gauge): 1=ready, 0=anything else, per target

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::probe::ProbeResult;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "failed to install metrics exporter"),
    }
}

pub fn record_probe(result: &ProbeResult) {
    metrics::counter!("pilot_probes_total", "classification" => result.classification.as_str())
        .increment(1);
    metrics::histogram!("pilot_probe_latency_seconds").record(result.latency.as_secs_f64());
}

pub fn record_step(kind: &'static str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("pilot_plan_steps_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_selection(strategy: &'static str, ready: bool) {
    let outcome = if ready { "ready" } else { "failed" };
    metrics::counter!("pilot_selections_total", "strategy" => strategy, "outcome" => outcome)
        .increment(1);
}

pub fn record_backend_ready(target: &str, ready: bool) {
    metrics::gauge!("pilot_backend_ready", "target" => target.to_string())
        .set(if ready { 1.0 } else { 0.0 });
}

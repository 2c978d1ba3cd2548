//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): time to response headers
//! - `gateway_generations_total` (counter): pipeline runs by outcome
//! - `gateway_generation_duration_seconds` (histogram): pipeline run time
//! - `gateway_uploads_rejected_total` (counter): rejected uploads by reason
//! - `gateway_cleanups_total` (counter): temp file deletions by outcome
//! - `gateway_jobs_in_flight` (gauge): generations currently running
//! - `gateway_pending_cleanups` (gauge): temp files not yet deleted

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_generation(outcome: &'static str, start: Instant) {
    counter!("gateway_generations_total", "outcome" => outcome).increment(1);
    histogram!("gateway_generation_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upload_rejected(reason: &'static str) {
    counter!("gateway_uploads_rejected_total", "reason" => reason).increment(1);
}

pub fn record_cleanup(outcome: &'static str) {
    counter!("gateway_cleanups_total", "outcome" => outcome).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!("gateway_jobs_in_flight").set(count as f64);
}

pub fn set_pending_cleanups(count: usize) {
    gauge!("gateway_pending_cleanups").set(count as f64);
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by route class and outcome
//! - `guard_request_duration_seconds` (histogram): end-to-end latency
//! - `guard_security_events_total` (counter): security events by kind
//! - `guard_anomalies_total` (counter): suspicious-activity signals raised
//! - `guard_lockouts_total` (counter): lockouts started
//! - `guard_tracked_clients` (gauge): client records held per store
//! - `guard_swept_records_total` (counter): records evicted per store
//! - `guard_config_reloads_total` (counter): reload attempts by result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so the stores can
//!   record unconditionally and tests need no setup
//! - The Prometheus exporter serves its own listener, separate from traffic

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

pub const METRIC_REQUESTS_TOTAL: &str = "guard_requests_total";
pub const METRIC_REQUEST_DURATION: &str = "guard_request_duration_seconds";
pub const METRIC_SECURITY_EVENTS_TOTAL: &str = "guard_security_events_total";
pub const METRIC_ANOMALIES_TOTAL: &str = "guard_anomalies_total";
pub const METRIC_LOCKOUTS_TOTAL: &str = "guard_lockouts_total";
pub const METRIC_TRACKED_CLIENTS: &str = "guard_tracked_clients";
pub const METRIC_SWEPT_RECORDS_TOTAL: &str = "guard_swept_records_total";
pub const METRIC_CONFIG_RELOADS_TOTAL: &str = "guard_config_reloads_total";

/// Install the Prometheus recorder and start its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metric_descriptions();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn register_metric_descriptions() {
    describe_counter!(METRIC_REQUESTS_TOTAL, "Requests seen by the guard, by route class and outcome");
    describe_histogram!(METRIC_REQUEST_DURATION, Unit::Seconds, "Request latency including upstream time");
    describe_counter!(METRIC_SECURITY_EVENTS_TOTAL, "Security events logged, by kind");
    describe_counter!(METRIC_ANOMALIES_TOTAL, "Suspicious activity signals raised");
    describe_counter!(METRIC_LOCKOUTS_TOTAL, "Client lockouts started");
    describe_gauge!(METRIC_TRACKED_CLIENTS, "Client records currently held, by store");
    describe_counter!(METRIC_SWEPT_RECORDS_TOTAL, "Stale records evicted, by store");
    describe_counter!(METRIC_CONFIG_RELOADS_TOTAL, "Configuration reload attempts, by result");
}

pub fn record_request(class: &'static str, outcome: &'static str, start: Instant) {
    counter!(METRIC_REQUESTS_TOTAL, "class" => class, "outcome" => outcome).increment(1);
    histogram!(METRIC_REQUEST_DURATION, "class" => class).record(start.elapsed().as_secs_f64());
}

pub fn record_security_event(kind: &'static str) {
    counter!(METRIC_SECURITY_EVENTS_TOTAL, "kind" => kind).increment(1);
}

pub fn record_anomaly() {
    counter!(METRIC_ANOMALIES_TOTAL).increment(1);
}

pub fn record_lockout() {
    counter!(METRIC_LOCKOUTS_TOTAL).increment(1);
}

pub fn set_tracked_clients(store: &'static str, count: usize) {
    gauge!(METRIC_TRACKED_CLIENTS, "store" => store).set(count as f64);
}

pub fn record_swept(store: &'static str, count: usize) {
    counter!(METRIC_SWEPT_RECORDS_TOTAL, "store" => store).increment(count as u64);
}

pub fn record_config_reload(success: bool) {
    let result = if success { "applied" } else { "rejected" };
    counter!(METRIC_CONFIG_RELOADS_TOTAL, "result" => result).increment(1);
}

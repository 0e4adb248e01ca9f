//! Metrics instrumentation for ember-dns.
//!
//! All metrics are prefixed with `ember_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query.
pub fn record_query(record_type: &str, outcome: QueryOutcome, duration: std::time::Duration) {
    let outcome_str = match outcome {
        QueryOutcome::Answer => "answer",
        QueryOutcome::NoData => "no_data",
        QueryOutcome::NotAuthoritative => "not_authoritative",
        QueryOutcome::Skipped => "skipped",
    };

    counter!("ember_dns.query.count", "type" => record_type.to_string(), "outcome" => outcome_str)
        .increment(1);
    histogram!("ember_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query outcome for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryOutcome {
    /// Query returned records.
    Answer,
    /// Authoritative name, no data of the requested type.
    NoData,
    /// Name outside every registered zone.
    NotAuthoritative,
    /// Question skipped (non-IN class or unsupported shape).
    Skipped,
}

/// Record an update API request.
pub fn record_api_request(endpoint: &str, status: u16) {
    counter!(
        "ember_dns.api.request.count",
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a store change notification.
pub fn record_store_event(kind: &'static str) {
    counter!("ember_dns.store.event.count", "event" => kind).increment(1);
}

/// Record a host record removed by its TTL timer.
pub fn record_expiry() {
    counter!("ember_dns.store.expiry.count").increment(1);
}

/// Record store table sizes (call periodically or on change).
pub fn record_store_counts(zones: usize, hosts: usize, timers: usize) {
    gauge!("ember_dns.store.zones.count").set(zones as f64);
    gauge!("ember_dns.store.hosts.count").set(hosts as f64);
    gauge!("ember_dns.store.timers.count").set(timers as f64);
}

/// Record a zone's SOA serial.
pub fn record_zone_serial(zone: &str, serial: u32) {
    gauge!("ember_dns.store.serial", "zone" => zone.to_string()).set(serial as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

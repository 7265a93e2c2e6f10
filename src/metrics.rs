//! Metrics helpers for Conduit.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is embedded;
//! whichever recorder the embedding application installs receives these.
//!
//! Provided metrics (labels vary by family):
//! * `conduit_requests_total` (counter)
//! * `conduit_request_duration_seconds` (histogram)
//! * `conduit_auth_decisions_total` (counter, label `outcome`)
//! * `conduit_response_cache_total` (counter, label `result`)
//! * `conduit_backend_requests_total` (counter)
//! * `conduit_backend_request_duration_seconds` (histogram)
//! * `conduit_service_health_status` (gauge per service)
//!
//! The `*Timer` structs record their duration on `Drop`, so early returns
//! and dropped (cancelled) futures are still measured.
use std::{collections::HashMap, sync::Mutex, time::Instant};

use metrics::{
    Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use once_cell::sync::Lazy;

pub const CONDUIT_SERVICE_HEALTH_STATUS: &str = "conduit_service_health_status";
pub const CONDUIT_REQUESTS_TOTAL: &str = "conduit_requests_total";
pub const CONDUIT_REQUEST_DURATION_SECONDS: &str = "conduit_request_duration_seconds";
pub const CONDUIT_AUTH_DECISIONS_TOTAL: &str = "conduit_auth_decisions_total";
pub const CONDUIT_RESPONSE_CACHE_TOTAL: &str = "conduit_response_cache_total";
pub const CONDUIT_BACKEND_REQUESTS_TOTAL: &str = "conduit_backend_requests_total";
pub const CONDUIT_BACKEND_REQUEST_DURATION_SECONDS: &str =
    "conduit_backend_request_duration_seconds";

/// Last reported health per service (1.0 healthy, 0.0 unhealthy).
pub static SERVICE_HEALTH_GAUGES: Lazy<Mutex<HashMap<String, f64>>> = Lazy::new(|| {
    describe_gauge!(
        CONDUIT_SERVICE_HEALTH_STATUS,
        "Health status of individual services (1 for healthy, 0 for unhealthy)"
    );
    describe_counter!(
        CONDUIT_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of HTTP requests processed by the gateway."
    );
    describe_histogram!(
        CONDUIT_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests processed by the gateway."
    );
    describe_counter!(
        CONDUIT_AUTH_DECISIONS_TOTAL,
        Unit::Count,
        "Authentication decisions taken by the auth gate, by outcome."
    );
    describe_counter!(
        CONDUIT_RESPONSE_CACHE_TOTAL,
        Unit::Count,
        "Response cache lookups, by result (hit, miss, bypass)."
    );
    describe_counter!(
        CONDUIT_BACKEND_REQUESTS_TOTAL,
        Unit::Count,
        "Total number of HTTP requests rerouted to backend services."
    );
    describe_histogram!(
        CONDUIT_BACKEND_REQUEST_DURATION_SECONDS,
        Unit::Seconds,
        "Latency of HTTP requests rerouted to backend services."
    );

    Mutex::new(HashMap::new())
});

pub fn set_service_health_status(service: &str, is_healthy: bool) {
    let health_value = if is_healthy { 1.0 } else { 0.0 };

    if let Ok(mut gauges) = SERVICE_HEALTH_GAUGES.lock() {
        gauges.insert(service.to_string(), health_value);
    } else {
        tracing::error!("Failed to acquire lock for service health gauges");
        return;
    }

    gauge!(CONDUIT_SERVICE_HEALTH_STATUS, "service" => service.to_string()).set(health_value);
}

pub fn increment_request_total(path: &str, method: &str, status: u16) {
    counter!(
        CONDUIT_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_request_duration(path: &str, method: &str, duration: std::time::Duration) {
    histogram!(
        CONDUIT_REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// `outcome` is one of `public`, `cached`, `authority`, `missing_header`,
/// `invalid`, `revoked`, `unavailable`.
pub fn increment_auth_decision(outcome: &'static str) {
    counter!(CONDUIT_AUTH_DECISIONS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn increment_response_cache(service: &str, result: &'static str) {
    counter!(
        CONDUIT_RESPONSE_CACHE_TOTAL,
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn increment_backend_request_total(service: &str, method: &str, status: u16) {
    counter!(
        CONDUIT_BACKEND_REQUESTS_TOTAL,
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_backend_request_duration(
    service: &str,
    method: &str,
    duration: std::time::Duration,
) {
    histogram!(
        CONDUIT_BACKEND_REQUEST_DURATION_SECONDS,
        "service" => service.to_string(),
        "method" => method.to_string()
    )
    .record(duration.as_secs_f64());
}

/// RAII helper measuring inbound request duration.
pub struct RequestTimer {
    start: Instant,
    path: String,
    method: String,
}

impl RequestTimer {
    pub fn new(path: &str, method: &str) -> Self {
        Self {
            start: Instant::now(),
            path: path.to_string(),
            method: method.to_string(),
        }
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        record_request_duration(&self.path, &self.method, self.start.elapsed());
    }
}

/// RAII helper measuring rerouted request duration.
pub struct BackendRequestTimer {
    start: Instant,
    service: String,
    method: String,
}

impl BackendRequestTimer {
    pub fn new(service: &str, method: &str) -> Self {
        Self {
            start: Instant::now(),
            service: service.to_string(),
            method: method.to_string(),
        }
    }
}

impl Drop for BackendRequestTimer {
    fn drop(&mut self) {
        record_backend_request_duration(&self.service, &self.method, self.start.elapsed());
    }
}

/// Register metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    Lazy::force(&SERVICE_HEALTH_GAUGES);
    tracing::debug!("Conduit metric descriptions registered");
    Ok(())
}

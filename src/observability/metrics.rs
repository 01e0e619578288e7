//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Install the Prometheus recorder
//! - Record inbound request and upstream call metrics
//! - Keep label cardinality bounded
//!
//! # Metrics
//! - `vulners_proxy_http_requests_total` (counter): method, status_code, path_prefix
//! - `vulners_proxy_http_request_duration_seconds` (histogram): method, status_code, path_prefix
//! - `vulners_proxy_http_requests_in_flight` (gauge)
//! - `vulners_proxy_upstream_responses_total` (counter): method, status_code
//! - `vulners_proxy_upstream_request_duration_seconds` (histogram): method
//!
//! # Design Decisions
//! - Paths are collapsed to a fixed prefix set before use as a label
//! - Unknown methods collapse to "other"
//! - Failed upstream calls use status_code "error"

use std::time::Instant;

use axum::http::Method;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::config::schema::DEFAULT_METRICS_PATH;
use crate::routing::{API_V3_PREFIX, API_V4_PREFIX, HEALTHZ_PATH, STATUS_PATH};

pub const HTTP_REQUESTS_TOTAL: &str = "vulners_proxy_http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "vulners_proxy_http_request_duration_seconds";
pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vulners_proxy_http_requests_in_flight";
pub const UPSTREAM_RESPONSES_TOTAL: &str = "vulners_proxy_upstream_responses_total";
pub const UPSTREAM_REQUEST_DURATION: &str = "vulners_proxy_upstream_request_duration_seconds";

/// Latency buckets, in seconds.
const LATENCY_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), &LATENCY_BUCKETS)?
        .install_recorder()
}

/// Record one completed inbound request.
pub fn record_request(method: &'static str, status: u16, path_prefix: &'static str, start: Instant) {
    let status_code = status.to_string();
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method,
        "status_code" => status_code.clone(),
        "path_prefix" => path_prefix
    )
    .increment(1);
    histogram!(
        HTTP_REQUEST_DURATION,
        "method" => method,
        "status_code" => status_code,
        "path_prefix" => path_prefix
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record one upstream call. `status` is `None` when no response arrived.
pub fn record_upstream(method: &'static str, status: Option<u16>, start: Instant) {
    let status_code = status.map_or_else(|| "error".to_string(), |s| s.to_string());
    counter!(UPSTREAM_RESPONSES_TOTAL, "method" => method, "status_code" => status_code).increment(1);
    histogram!(UPSTREAM_REQUEST_DURATION, "method" => method)
        .record(start.elapsed().as_secs_f64());
}

/// Records one upstream call when dropped.
///
/// A call abandoned mid-flight (the caller's future was dropped) is still
/// counted, with status "error".
pub struct UpstreamCallGuard {
    method: &'static str,
    start: Instant,
    status: Option<u16>,
}

impl UpstreamCallGuard {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            start: Instant::now(),
            status: None,
        }
    }

    /// Mark the call as answered with `status`.
    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for UpstreamCallGuard {
    fn drop(&mut self) {
        record_upstream(self.method, self.status, self.start);
    }
}

/// Holds the in-flight gauge up for its lifetime.
pub struct InFlightGuard(());

impl InFlightGuard {
    pub fn new() -> Self {
        gauge!(HTTP_REQUESTS_IN_FLIGHT).increment(1.0);
        Self(())
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);
    }
}

/// Map a method to a bounded label.
pub fn normalize_method(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::PATCH => "PATCH",
        Method::HEAD => "HEAD",
        Method::OPTIONS => "OPTIONS",
        _ => "other",
    }
}

/// Map a request path to a bounded label.
pub fn normalize_path(path: &str) -> &'static str {
    if path == API_V3_PREFIX || path.starts_with("/api/v3/") {
        API_V3_PREFIX
    } else if path == API_V4_PREFIX || path.starts_with("/api/v4/") {
        API_V4_PREFIX
    } else if path == HEALTHZ_PATH {
        HEALTHZ_PATH
    } else if path == STATUS_PATH {
        STATUS_PATH
    } else if path == DEFAULT_METRICS_PATH {
        DEFAULT_METRICS_PATH
    } else {
        "other"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_method() {
        assert_eq!(normalize_method(&Method::GET), "GET");
        assert_eq!(normalize_method(&Method::PATCH), "PATCH");
        assert_eq!(normalize_method(&Method::from_bytes(b"PROPFIND").unwrap()), "other");
        assert_eq!(normalize_method(&Method::TRACE), "other");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v3/search/lucene/"), "/api/v3");
        assert_eq!(normalize_path("/api/v4"), "/api/v4");
        assert_eq!(normalize_path("/api/v4/audit/software"), "/api/v4");
        assert_eq!(normalize_path("/healthz"), "/healthz");
        assert_eq!(normalize_path("/proxy/status"), "/proxy/status");
        assert_eq!(normalize_path("/metrics"), "/metrics");
        assert_eq!(normalize_path("/api/v30/x"), "other");
        assert_eq!(normalize_path("/wp-admin/../etc/passwd"), "other");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let start = Instant::now();
        record_request("GET", 200, "/api/v3", start);
        record_upstream("GET", None, start);
        let _guard = InFlightGuard::new();
    }
}

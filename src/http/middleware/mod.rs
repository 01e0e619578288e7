//! Request middleware.
//!
//! Applied outermost first: request ID, request log, metrics, body limit,
//! security headers, rate limit. See [`crate::http::server`].

pub mod metrics;
pub mod request_log;

pub use self::metrics::metrics_middleware;
pub use request_log::request_log_middleware;

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → axum router matches one of the proxied prefixes (/api/v3, /api/v4)
//!       or a local endpoint (/healthz, /proxy/status, metrics)
//!     → rewrite.rs builds the upstream URL for proxied requests
//! ```
//!
//! # Design Decisions
//! - Only two proxied prefixes; both map 1:1 onto the upstream path
//! - Route matching is method-agnostic for proxied prefixes
//! - No regex routing

pub mod rewrite;

pub use rewrite::{build_upstream_url, is_credential_param, parse_query, API_KEY_PARAM};

/// Upstream API v3 prefix.
pub const API_V3_PREFIX: &str = "/api/v3";
/// Upstream API v4 prefix.
pub const API_V4_PREFIX: &str = "/api/v4";
/// Liveness check.
pub const HEALTHZ_PATH: &str = "/healthz";
/// Proxy status endpoint.
pub const STATUS_PATH: &str = "/proxy/status";

/// Prefixes forwarded to the upstream.
pub const PROXIED_PREFIXES: [&str; 2] = [API_V3_PREFIX, API_V4_PREFIX];

//! Forwarding engine.
//!
//! # Data Flow
//! ```text
//! InboundRequest (method, path, query, headers, body, cancel)
//!     → credentials (shared key wins, else X-Api-Key, else 401)
//!     → request header allow-list + fixed User-Agent
//!     → upstream URL (fixed scheme/host, inbound path, sanitized query)
//!     → UpstreamClient (deadline + cancellation)
//!     → response header allow-list
//!     → UpstreamResponse (status, headers, streaming body)
//! ```
//!
//! # Design Decisions
//! - One immutable [`ForwardingConfig`] built at startup, shared via `Arc`
//! - No retries: proxied methods are not assumed idempotent
//! - Every failure is a [`ForwardError`]; nothing else leaves the engine

pub mod error;
pub mod forwarder;

use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Method, Request, StatusCode};
use hyper::body::Incoming;
use tokio_util::sync::CancellationToken;

use crate::config::{ConfigError, ProxyConfig};
use crate::routing::parse_query;
use crate::security::headers::OUTBOUND_USER_AGENT;
use crate::security::{ApiKey, UpstreamBase};

pub use error::ForwardError;
pub use forwarder::Forwarder;

/// Immutable settings shared by every forwarded request.
#[derive(Debug, Clone)]
pub struct ForwardingConfig {
    /// Allow-listed upstream base URL.
    pub upstream: UpstreamBase,
    /// Shared key; `None` selects per-request `X-Api-Key` mode.
    pub shared_key: Option<ApiKey>,
    /// Deadline for one upstream exchange.
    pub timeout: Duration,
    /// Idle pooled connections kept to the upstream.
    pub idle_connections: usize,
    /// `User-Agent` stamped on every upstream call.
    pub user_agent: HeaderValue,
}

impl ForwardingConfig {
    /// Build the snapshot from a validated config with defaults applied.
    ///
    /// Runs the upstream allow-list check; a rejection here is fatal.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let upstream = UpstreamBase::validate(&config.upstream.base_url)?;

        Ok(Self {
            upstream,
            shared_key: ApiKey::new(config.vulners.api_key.clone()),
            timeout: Duration::from_secs(config.upstream.timeout_seconds),
            idle_connections: config.upstream.idle_connections,
            user_agent: HeaderValue::from_static(OUTBOUND_USER_AGENT),
        })
    }

    /// Whether clients must bring their own key.
    pub fn per_request_keys(&self) -> bool {
        self.shared_key.is_none()
    }
}

/// One inbound call as seen by the engine.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub path: String,
    /// Query pairs, still percent-encoded.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Body,
    /// Fires when the client goes away.
    pub cancel: CancellationToken,
}

impl InboundRequest {
    /// Split an axum request into engine input.
    pub fn from_http(request: Request<Body>, cancel: CancellationToken) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parse_query(parts.uri.query()),
            headers: parts.headers,
            body,
            cancel,
        }
    }
}

/// Upstream reply with filtered headers and the still-open body.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Incoming,
    /// Deadline still bounding the body relay.
    pub deadline: tokio::time::Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, api_key: &str) -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.upstream.base_url = base_url.to_string();
        config.vulners.api_key = api_key.to_string();
        config.apply_defaults();
        config
    }

    #[test]
    fn test_snapshot_from_config() {
        let snapshot = ForwardingConfig::from_config(&config("https://vulners.com", "K1")).unwrap();
        assert_eq!(snapshot.upstream.url().host_str(), Some("vulners.com"));
        assert_eq!(snapshot.shared_key.as_ref().map(ApiKey::expose), Some("K1"));
        assert_eq!(snapshot.timeout, Duration::from_secs(120));
        assert_eq!(snapshot.idle_connections, 100);
        assert!(!snapshot.per_request_keys());
    }

    #[test]
    fn test_empty_key_selects_per_request_mode() {
        let snapshot = ForwardingConfig::from_config(&config("https://vulners.com", "")).unwrap();
        assert!(snapshot.per_request_keys());
    }

    #[test]
    fn test_snapshot_rejects_foreign_host() {
        let err = ForwardingConfig::from_config(&config("https://attacker.example", "K1")).unwrap_err();
        assert!(matches!(err, ConfigError::HostNotAllowed(_)));
    }

    #[test]
    fn test_snapshot_debug_hides_key() {
        let snapshot = ForwardingConfig::from_config(&config("https://vulners.com", "SECRET")).unwrap();
        assert!(!format!("{snapshot:?}").contains("SECRET"));
    }

    #[test]
    fn test_inbound_request_from_http() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v4/audit/?os=debian&apiKey=bad")
            .header("x-api-key", "K2")
            .body(Body::empty())
            .unwrap();

        let inbound = InboundRequest::from_http(request, CancellationToken::new());
        assert_eq!(inbound.method, Method::POST);
        assert_eq!(inbound.path, "/api/v4/audit/");
        assert_eq!(
            inbound.query,
            vec![
                ("os".to_string(), "debian".to_string()),
                ("apiKey".to_string(), "bad".to_string()),
            ]
        );
        assert_eq!(inbound.headers.get("x-api-key").unwrap(), "K2");
    }
}

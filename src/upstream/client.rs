//! Pooled HTTPS client for the upstream API.
//!
//! # Responsibilities
//! - Keep warm connections to the upstream (HTTP/1.1 and HTTP/2 over TLS)
//! - Bound every call by a deadline
//! - Abandon the call as soon as the inbound request is cancelled
//! - Record upstream metrics for every attempt, including failures

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::proxy::error::ForwardError;

/// How long an unused pooled connection is kept.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// TCP connect limit, independent of the overall call deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TCP_KEEPALIVE: Duration = Duration::from_secs(30);

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

fn http_connector() -> HttpConnector {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(Some(CONNECT_TIMEOUT));
    http.set_keepalive(Some(TCP_KEEPALIVE));
    http
}

/// Shared client used for all upstream calls.
#[derive(Clone)]
pub struct UpstreamClient {
    client: HttpsClient,
}

impl UpstreamClient {
    /// Build a client trusting the platform's native roots.
    ///
    /// `idle_per_host` caps the idle pool; the upstream is a single host.
    pub fn new(idle_per_host: usize) -> Result<Self, std::io::Error> {
        // https_or_http: the allow-list already pins production to https, and
        // loopback test upstreams speak plain HTTP.
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector());

        Ok(Self::from_connector(https, idle_per_host))
    }

    /// Build a client from an explicit TLS config, e.g. a private trust
    /// store.
    pub fn with_tls_config(tls: rustls::ClientConfig, idle_per_host: usize) -> Self {
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .wrap_connector(http_connector());

        Self::from_connector(https, idle_per_host)
    }

    fn from_connector(https: HttpsConnector<HttpConnector>, idle_per_host: usize) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(idle_per_host)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .build(https);

        Self { client }
    }

    /// Send one request, racing it against `deadline` and `cancel`.
    ///
    /// Cancellation is checked first, so an already-cancelled token never
    /// reaches the network. The call is recorded even if this future is
    /// dropped before it resolves.
    pub async fn send(
        &self,
        request: Request<Body>,
        deadline: tokio::time::Instant,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Response<Incoming>, ForwardError> {
        let mut call = metrics::UpstreamCallGuard::new(metrics::normalize_method(request.method()));

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ForwardError::ClientDisconnected),
            outcome = tokio::time::timeout_at(deadline, self.client.request(request)) => match outcome {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(err)) => Err(ForwardError::from_transport(err)),
                Err(_) => Err(ForwardError::UpstreamTimeout(timeout)),
            },
        };

        if let Ok(response) = &result {
            call.set_status(response.status().as_u16());
        }
        result
    }
}

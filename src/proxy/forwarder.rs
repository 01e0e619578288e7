//! The per-request forwarding pipeline.

use std::sync::Arc;

use axum::http::{Request, Uri};

use crate::config::ConfigError;
use crate::proxy::{ForwardError, ForwardingConfig, InboundRequest, UpstreamResponse};
use crate::routing::build_upstream_url;
use crate::security::{filter_request_headers, filter_response_headers, resolve_api_key};
use crate::upstream::UpstreamClient;

/// Forwards inbound calls to the upstream API.
///
/// Cheap to share: the snapshot is behind an `Arc` and the client is a
/// handle onto a shared pool.
#[derive(Clone)]
pub struct Forwarder {
    config: Arc<ForwardingConfig>,
    client: UpstreamClient,
}

impl Forwarder {
    /// Build a forwarder with its own connection pool.
    pub fn new(config: ForwardingConfig) -> Result<Self, ConfigError> {
        let client = UpstreamClient::new(config.idle_connections).map_err(ConfigError::TlsRoots)?;
        Ok(Self::with_client(config, client))
    }

    /// Forwarder over an existing client.
    pub fn with_client(config: ForwardingConfig, client: UpstreamClient) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }

    /// The snapshot this forwarder runs with.
    pub fn config(&self) -> &ForwardingConfig {
        &self.config
    }

    /// Forward one request.
    ///
    /// On success the body is still streaming; the caller owns it.
    pub async fn forward(&self, request: InboundRequest) -> Result<UpstreamResponse, ForwardError> {
        let InboundRequest {
            method,
            path,
            query,
            headers,
            body,
            cancel,
        } = request;

        // Credential first: a missing key never reaches the network.
        let api_key = resolve_api_key(self.config.shared_key.as_ref(), &headers)?;

        let outbound_headers = filter_request_headers(&headers, &self.config.user_agent);
        let url = build_upstream_url(self.config.upstream.url(), &path, &query, &api_key);
        let uri: Uri = url
            .as_str()
            .parse()
            .map_err(|e| ForwardError::UpstreamRequestFailed(Box::new(e)))?;

        tracing::debug!(method = %method, path = %path, "Forwarding request");

        let mut outbound = Request::new(body);
        *outbound.method_mut() = method;
        *outbound.uri_mut() = uri;
        *outbound.headers_mut() = outbound_headers;

        let deadline = tokio::time::Instant::now() + self.config.timeout;
        let response = self
            .client
            .send(outbound, deadline, self.config.timeout, &cancel)
            .await?;

        let (parts, body) = response.into_parts();
        Ok(UpstreamResponse {
            status: parts.status,
            headers: filter_response_headers(&parts.headers),
            body,
            deadline,
        })
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

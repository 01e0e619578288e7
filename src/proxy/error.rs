//! Forwarding failures and their client-visible outcomes.
//!
//! Every per-request failure is one [`ForwardError`] variant. The mapping
//! to status code and message is an exhaustive match, and the message is
//! fixed per class: upstream error text never reaches the client.

use std::error::Error as StdError;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::security::redact::sanitize_error;

/// Boxed error used for transport sources.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Errors that can occur while forwarding one request.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Neither a shared key nor an `X-Api-Key` header was available.
    #[error("no API key: shared key empty and no X-Api-Key header")]
    MissingCredential,

    /// The upstream call exceeded the configured timeout.
    #[error("upstream call exceeded timeout of {0:?}")]
    UpstreamTimeout(Duration),

    /// The inbound request was cancelled before the upstream call completed.
    #[error("client disconnected before upstream call completed")]
    ClientDisconnected,

    /// The upstream host name could not be resolved.
    #[error("upstream name resolution failed")]
    UpstreamUnreachable(#[source] BoxError),

    /// Connecting to or talking with the upstream failed.
    #[error("upstream transport failed")]
    UpstreamConnectionFailed(#[source] BoxError),

    /// The outbound call could not be made for any other reason.
    #[error("forwarding failed")]
    UpstreamRequestFailed(#[source] BoxError),
}

impl ForwardError {
    /// Classify a pooled-client failure.
    pub fn from_transport(err: hyper_util::client::legacy::Error) -> Self {
        if err.is_connect() && is_dns_failure(&err) {
            Self::UpstreamUnreachable(Box::new(err))
        } else {
            Self::UpstreamConnectionFailed(Box::new(err))
        }
    }

    /// Stable class label for logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::ClientDisconnected => "client_disconnected",
            Self::UpstreamUnreachable(_) => "upstream_unreachable",
            Self::UpstreamConnectionFailed(_) => "upstream_connection_failed",
            Self::UpstreamRequestFailed(_) => "upstream_request_failed",
        }
    }

    /// Status code sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::ClientDisconnected
            | Self::UpstreamUnreachable(_)
            | Self::UpstreamConnectionFailed(_)
            | Self::UpstreamRequestFailed(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Fixed, generic message sent to the client.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::MissingCredential => "API key required: set api_key in config or send X-Api-Key header",
            Self::UpstreamTimeout(_) => "upstream request timed out",
            Self::ClientDisconnected => "client disconnected",
            Self::UpstreamUnreachable(_) => "upstream host unreachable",
            Self::UpstreamConnectionFailed(_) => "upstream connection failed",
            Self::UpstreamRequestFailed(_) => "upstream request failed",
        }
    }

    /// Log this failure with its redacted cause chain.
    pub fn report(&self, method: &str, path: &str) {
        tracing::error!(
            class = self.class(),
            status = self.status_code().as_u16(),
            method = %method,
            path = %path,
            error = %sanitize_error(self),
            "proxy error"
        );
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(json!({ "error": self.client_message() })),
        )
            .into_response()
    }
}

/// hyper-util reports resolver failures as a connect error whose message
/// is "dns error".
fn is_dns_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if e.to_string().starts_with("dns error") {
            return true;
        }
        current = e.source();
    }
    false
}

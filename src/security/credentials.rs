//! API key resolution.
//!
//! A configured shared key always wins. Only when it is absent does the
//! resolver read the client's `X-Api-Key` header. There is no other source.

use axum::http::HeaderMap;

use crate::proxy::error::ForwardError;

/// Header clients use to supply their own key in per-request mode.
pub const X_API_KEY: &str = "x-api-key";

/// A non-empty Vulners API key.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for an empty key.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        (!value.is_empty()).then_some(Self(value))
    }

    /// The raw key, for placing in the upstream query only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Pick the key for one call.
pub fn resolve_api_key(shared: Option<&ApiKey>, headers: &HeaderMap) -> Result<ApiKey, ForwardError> {
    if let Some(key) = shared {
        return Ok(key.clone());
    }

    headers
        .get(X_API_KEY)
        .and_then(|v| v.to_str().ok())
        .and_then(ApiKey::new)
        .ok_or(ForwardError::MissingCredential)
}

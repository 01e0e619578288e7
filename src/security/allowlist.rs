//! Upstream host allow-list.
//!
//! Checked once while building the forwarding snapshot. A rejection is a
//! startup failure, never a per-request outcome.

use url::Url;

use crate::config::ConfigError;

/// Hosts the proxy may forward to.
pub const ALLOWED_UPSTREAM_HOSTS: &[&str] = &["vulners.com"];

/// A base URL that passed the allow-list check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamBase(Url);

impl UpstreamBase {
    /// Parse and validate a configured base URL against
    /// [`ALLOWED_UPSTREAM_HOSTS`].
    pub fn validate(raw: &str) -> Result<Self, ConfigError> {
        Self::validate_against(raw, ALLOWED_UPSTREAM_HOSTS)
    }

    /// Parse and validate against an explicit allow-set.
    pub fn validate_against(raw: &str, allowed: &[&str]) -> Result<Self, ConfigError> {
        let url = Url::parse(raw)?;

        if url.scheme() != "https" {
            return Err(ConfigError::InsecureUpstream(url.scheme().to_string()));
        }

        let host = url.host_str().unwrap_or_default();
        if !allowed.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            return Err(ConfigError::HostNotAllowed(host.to_string()));
        }

        Ok(Self(url))
    }

    /// Skip validation. Test upstreams listen on plain-HTTP loopback.
    #[cfg(test)]
    pub(crate) fn unchecked(raw: &str) -> Self {
        Self(Url::parse(raw).expect("test upstream URL"))
    }

    /// The validated URL.
    pub fn url(&self) -> &Url {
        &self.0
    }
}

//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, rates)
//! - Require a secure upstream base URL
//! - Keep the metrics path clear of proxied and health routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before defaults are applied and before config is accepted

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::routing::{API_V3_PREFIX, API_V4_PREFIX, HEALTHZ_PATH, STATUS_PATH};

/// Placeholder value shipped in the sample configuration.
pub const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "text"];

/// A single semantic problem in a configuration file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("vulners.api_key contains placeholder value; set a real key or leave empty for per-request X-Api-Key mode")]
    PlaceholderApiKey,

    #[error("upstream.base_url is required")]
    MissingBaseUrl,

    #[error("upstream.base_url is not a valid URL: {0}")]
    InvalidBaseUrl(String),

    #[error("upstream.base_url must use HTTPS; got {0:?}")]
    InsecureBaseUrl(String),

    #[error("server.port must be 0-65535; got {0}")]
    PortOutOfRange(u32),

    #[error("server.rate_limit.requests_per_second must be > 0 when rate limiting is enabled; got {0}")]
    InvalidRateLimit(f64),

    #[error("log.level must be one of: debug, info, warn, error; got {0:?}")]
    InvalidLogLevel(String),

    #[error("log.format must be one of: json, text; got {0:?}")]
    InvalidLogFormat(String),

    #[error("metrics.path must start with '/'; got {0:?}")]
    RelativeMetricsPath(String),

    #[error("metrics.path must be a literal route without '{{', '}}', ':' or '*' segments; got {0:?}")]
    NonLiteralMetricsPath(String),

    #[error("metrics.path {path:?} conflicts with reserved route {reserved:?}")]
    ReservedMetricsPath { path: String, reserved: &'static str },
}

/// Validate a parsed configuration, collecting every failure.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.vulners.api_key == API_KEY_PLACEHOLDER {
        errors.push(ValidationError::PlaceholderApiKey);
    }

    validate_base_url(&config.upstream.base_url, &mut errors);

    if config.server.port > u32::from(u16::MAX) {
        errors.push(ValidationError::PortOutOfRange(config.server.port));
    }

    let rate_limit = &config.server.rate_limit;
    if rate_limit.enabled && !(rate_limit.requests_per_second > 0.0) {
        errors.push(ValidationError::InvalidRateLimit(rate_limit.requests_per_second));
    }

    let level = config.log.level.to_lowercase();
    if !level.is_empty() && !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.log.level.clone()));
    }

    let format = config.log.format.to_lowercase();
    if !format.is_empty() && !LOG_FORMATS.contains(&format.as_str()) {
        errors.push(ValidationError::InvalidLogFormat(config.log.format.clone()));
    }

    if config.metrics.enabled && !config.metrics.path.is_empty() {
        validate_metrics_path(&config.metrics.path, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_base_url(raw: &str, errors: &mut Vec<ValidationError>) {
    if raw.is_empty() {
        errors.push(ValidationError::MissingBaseUrl);
        return;
    }

    match Url::parse(raw) {
        Ok(url) if url.scheme() != "https" => {
            errors.push(ValidationError::InsecureBaseUrl(raw.to_string()));
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::InvalidBaseUrl(e.to_string())),
    }
}

fn validate_metrics_path(path: &str, errors: &mut Vec<ValidationError>) {
    if !path.starts_with('/') {
        errors.push(ValidationError::RelativeMetricsPath(path.to_string()));
        return;
    }

    // The router treats these as captures and panics on malformed ones.
    let non_literal = path.contains(&['{', '}'][..])
        || path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'));
    if non_literal {
        errors.push(ValidationError::NonLiteralMetricsPath(path.to_string()));
    }

    for reserved in [API_V3_PREFIX, API_V4_PREFIX, HEALTHZ_PATH, STATUS_PATH] {
        if path == reserved || path.starts_with(&format!("{reserved}/")) {
            errors.push(ValidationError::ReservedMetricsPath {
                path: path.to_string(),
                reserved,
            });
        }
    }
}

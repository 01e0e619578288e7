//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::cli::Cli;
use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Paths checked in order when no explicit config is given.
pub const CONFIG_SEARCH_PATHS: [&str; 2] = ["/etc/vulners-proxy/config.toml", "configs/config.toml"];

/// Error type for configuration loading and startup validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (searched {0:?})")]
    NotFound(Vec<String>),

    #[error("read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("upstream base_url is not a valid URL: {0}")]
    InvalidUpstreamUrl(#[from] url::ParseError),

    #[error("upstream base_url must use HTTPS; got scheme {0:?}")]
    InsecureUpstream(String),

    #[error("upstream host {0:?} is not in the allowlist")]
    HostNotAllowed(String),

    #[error("load TLS trust roots: {0}")]
    TlsRoots(#[source] std::io::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A validated configuration together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ProxyConfig,
    pub path: PathBuf,
}

/// Resolve the config path, read it, apply CLI overrides, validate, and
/// fill defaults.
pub fn load(cli: &Cli) -> Result<LoadedConfig, ConfigError> {
    let path = match cli.config.as_deref().filter(|p| !p.is_empty()) {
        Some(explicit) => PathBuf::from(explicit),
        None => find_config_in(&CONFIG_SEARCH_PATHS).ok_or_else(|| {
            ConfigError::NotFound(CONFIG_SEARCH_PATHS.iter().map(|p| p.to_string()).collect())
        })?,
    };

    let mut config = read_config(&path)?;
    cli.apply_to(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;
    config.apply_defaults();

    Ok(LoadedConfig { config, path })
}

/// Read and parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// First path that exists on disk.
pub fn find_config_in<P: AsRef<Path>>(paths: &[P]) -> Option<PathBuf> {
    for candidate in paths {
        let candidate: &Path = candidate.as_ref();
        if candidate.exists() {
            return Some(candidate.to_path_buf());
        }
    }
    None
}

/// Warn when the config file (which may hold the API key) is readable by
/// group or others.
#[cfg(unix)]
pub fn warn_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let Ok(meta) = fs::metadata(path) else {
        return;
    };
    let mode = meta.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        tracing::warn!(
            path = %path.display(),
            mode = %format!("{mode:04o}"),
            "config file is readable by group/others; consider chmod 600"
        );
    }
}

#[cfg(not(unix))]
pub fn warn_permissions(_path: &Path) {}

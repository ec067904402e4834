//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require a parseable `http` or `https` upstream URL
//! - Validate the listen address and metrics path
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener is bound

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::http::request::{Upstream, UpstreamError};

/// A single semantic problem with a configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No upstream URL was provided.
    #[error("IPFS_API_URL environmental variable is required")]
    MissingUpstream,

    /// The upstream URL could not be used.
    #[error("invalid upstream URL {url:?}: {source}")]
    InvalidUpstream {
        url: String,
        #[source]
        source: UpstreamError,
    },

    /// The listen address is not `host:port` or `:port`.
    #[error("invalid listen address {0:?}: expected host:port or :port")]
    InvalidBindAddress(String),

    /// The metrics path cannot be routed.
    #[error("invalid metrics path {0:?}: must start with '/' and contain no route captures")]
    InvalidMetricsPath(String),
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.upstream.api_url.as_deref() {
        None => errors.push(ValidationError::MissingUpstream),
        Some(url) => {
            if let Err(source) = Upstream::parse(url) {
                errors.push(ValidationError::InvalidUpstream {
                    url: url.to_string(),
                    source,
                });
            }
        }
    }

    if !is_valid_bind_address(&config.listener.bind_address) {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if !is_valid_metrics_path(&config.observability.metrics_path) {
        errors.push(ValidationError::InvalidMetricsPath(
            config.observability.metrics_path.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A literal route: the router reads `:`, `{`, `}` and `*` as captures.
fn is_valid_metrics_path(path: &str) -> bool {
    path.starts_with('/') && !path.contains([':', '{', '}', '*'])
}

fn is_valid_bind_address(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((_, port)) => port.parse::<u16>().is_ok(),
        None => false,
    }
}

//! Configuration loading from the environment, command line and disk.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Command-line arguments. Every flag can also come from the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "ipfs-metrics-proxy")]
#[command(version, about = "Reverse proxy for an IPFS HTTP API with Prometheus metrics", long_about = None)]
pub struct Args {
    /// Optional TOML configuration file, applied before flags and environment.
    #[arg(short, long, env = "PROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address the proxy listens on (e.g. ":9100").
    #[arg(short, long, env = "LISTEN_ADDRESS")]
    pub listen_address: Option<String>,

    /// Base URL of the upstream IPFS API (e.g. "http://127.0.0.1:5001").
    #[arg(short, long, env = "IPFS_API_URL")]
    pub ipfs_api_url: Option<String>,
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the effective configuration: defaults, then the optional file,
/// then flags and environment. Empty values count as unset.
pub fn load(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(addr) = non_empty(&args.listen_address) {
        config.listener.bind_address = addr.to_string();
    }
    if let Some(url) = non_empty(&args.ipfs_api_url) {
        config.upstream.api_url = Some(url.to_string());
    }
    if non_empty(&config.upstream.api_url).is_none() {
        config.upstream.api_url = None;
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

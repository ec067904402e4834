//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits so a TOML file can provide any subset of them.

use serde::{Deserialize, Serialize};

/// Root configuration for the metrics proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single upstream API every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., ":9100" or "127.0.0.1:9100").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: ":9100".to_string(),
        }
    }
}

impl ListenerConfig {
    /// Bind address with a bare `:PORT` expanded to all interfaces.
    pub fn resolved_bind_address(&self) -> String {
        if self.bind_address.starts_with(':') {
            format!("0.0.0.0{}", self.bind_address)
        } else {
            self.bind_address.clone()
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API (e.g., "http://127.0.0.1:5001").
    /// Required; startup fails without it.
    pub api_url: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Path the metrics endpoint is served on. Every other path is proxied.
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_path: "/metrics".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Build a config forwarding to `api_url` with all other settings defaulted.
    pub fn for_upstream(api_url: impl Into<String>) -> Self {
        Self {
            upstream: UpstreamConfig {
                api_url: Some(api_url.into()),
            },
            ..Self::default()
        }
    }
}

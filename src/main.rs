//! IPFS API metrics proxy.
//!
//! ```text
//!     Client ──▶ listener ──▶ /metrics ──▶ Prometheus text
//!                    │
//!                    └──────▶ Forwarder ──▶ IPFS API (IPFS_API_URL)
//!                                 │
//!                                 └──▶ request_url_path / response_status / response_errors
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use ipfs_metrics_proxy::config::{self, Args, ValidationError};
use ipfs_metrics_proxy::http::{Forwarder, HttpServer, Upstream};
use ipfs_metrics_proxy::lifecycle::Shutdown;
use ipfs_metrics_proxy::observability::{logging, ProxyMetrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    tracing::info!("ipfs-metrics-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = match config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    let api_url = config
        .upstream
        .api_url
        .as_deref()
        .ok_or(ValidationError::MissingUpstream)?;
    let upstream = Upstream::parse(api_url)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %upstream,
        metrics_path = %config.observability.metrics_path,
        "Configuration loaded"
    );

    let metrics = Arc::new(ProxyMetrics::new());
    let forwarder = Forwarder::new(upstream, metrics)?;

    let listener = TcpListener::bind(config.listener.resolved_bind_address()).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::on_os_signal();

    let server = HttpServer::new(config, forwarder);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

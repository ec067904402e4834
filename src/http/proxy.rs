//! Single-upstream forwarding.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → record request_url_path
//!     → request.rs (rewrite to upstream)
//!     → hyper-util client (pooled keep-alive connections)
//!     → response hook (record response_status / response_errors)
//!     → response.rs (relay to caller)
//! ```
//!
//! A failed upstream exchange is final: no retries, no failover.
//! `http` and `https` upstreams share one client; TLS uses the webpki roots.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;

use crate::http::request::{OriginalRequest, Upstream};
use crate::http::response::{self, MetricsHook, ModifyResponse};
use crate::observability::metrics::ProxyMetrics;

type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Errors building the upstream client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to configure TLS: {0}")]
    Tls(#[from] rustls::Error),
}

/// Relays requests to the upstream and records metrics around each one.
pub struct Forwarder {
    upstream: Upstream,
    client: UpstreamClient,
    metrics: Arc<ProxyMetrics>,
    hook: Arc<dyn ModifyResponse>,
}

impl Forwarder {
    /// Create a forwarder whose response hook records status metrics.
    pub fn new(upstream: Upstream, metrics: Arc<ProxyMetrics>) -> Result<Self, ClientError> {
        let hook = Arc::new(MetricsHook::new(metrics.clone()));
        Ok(Self {
            upstream,
            client: build_client()?,
            metrics,
            hook,
        })
    }

    /// Replace the response hook.
    pub fn with_hook(mut self, hook: Arc<dyn ModifyResponse>) -> Self {
        self.hook = hook;
        self
    }

    pub fn metrics(&self) -> &Arc<ProxyMetrics> {
        &self.metrics
    }

    /// Forward one request and relay the upstream response.
    pub async fn handle(&self, request: Request<Body>, peer: Option<SocketAddr>) -> Response<Body> {
        let original = OriginalRequest::from_request(&request);
        tracing::info!(method = %original.method, path = %original.path, "Proxy receives request");
        self.metrics.record_request_path(&original.path);

        let outbound = match self.upstream.rewrite(request, peer) {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(path = %original.path, error = %e, "Failed to rewrite request");
                return response::bad_gateway();
            }
        };

        tracing::info!(upstream = %self.upstream, "Proxy forwards request to origin");
        let upstream_response = match self.client.request(outbound).await {
            Ok(res) => response::from_upstream(res),
            Err(e) => {
                tracing::error!(upstream = %self.upstream, path = %original.path, error = %e, "Upstream error");
                return response::bad_gateway();
            }
        };

        let relayed = match self.hook.modify(upstream_response, &original) {
            Ok(res) => response::relay(res),
            Err(e) => {
                tracing::error!(path = %original.path, error = %e, "Response hook failed");
                return response::bad_gateway();
            }
        };

        tracing::info!(status = relayed.status().as_u16(), "Origin server completes request");
        relayed
    }
}

fn build_client() -> Result<UpstreamClient, ClientError> {
    let mut http = HttpConnector::new();
    // Let `https` URIs through to the TLS layer.
    http.enforce_http(false);

    let connector = HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);
    Ok(Client::builder(TokioExecutor::new()).build(connector))
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the metrics endpoint and the proxy fallback
//! - Wire up tracing middleware
//! - Bind server to listener
//! - Serve until the shutdown signal fires

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::header,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::http::proxy::Forwarder;
use crate::observability::metrics::{self, ProxyMetrics};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
    pub metrics: Arc<ProxyMetrics>,
}

/// HTTP server for the metrics proxy.
pub struct HttpServer {
    router: Router,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server serving metrics and forwarding everything else.
    pub fn new(config: ProxyConfig, forwarder: Forwarder) -> Self {
        let state = AppState {
            metrics: forwarder.metrics().clone(),
            forwarder: Arc::new(forwarder),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            metrics_path: config.observability.metrics_path,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route(&config.observability.metrics_path, any(metrics_handler))
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    #[cfg(test)]
    fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            metrics_path = %self.metrics_path,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Forward any request not addressed to the metrics endpoint.
async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response<Body> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    state.forwarder.handle(request, peer).await
}

/// Render the counters for scraping.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, metrics::CONTENT_TYPE)],
        state.metrics.render(),
    )
}

//! Response handling and transformation.
//!
//! # Responsibilities
//! - Run the post-forward hook on every upstream response
//! - Record response status metrics from the hook
//! - Relay the upstream response to the client, streaming the body
//! - Map upstream failures to 502 Bad Gateway
//!
//! # Design Decisions
//! - Hook errors fail the response; metric errors never do
//! - Hop-by-hop headers stripped before relaying

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use hyper::body::Incoming;
use thiserror::Error;

use crate::http::request::{request_target_path, strip_hop_by_hop, OriginalRequest};
use crate::observability::metrics::ProxyMetrics;

/// Error raised by a response hook; the caller receives 502.
#[derive(Debug, Error)]
#[error("response hook failed: {0}")]
pub struct HookError(pub String);

/// Post-forward hook run on each upstream response before it is relayed.
pub trait ModifyResponse: Send + Sync {
    fn modify(
        &self,
        response: Response<Body>,
        request: &OriginalRequest,
    ) -> Result<Response<Body>, HookError>;
}

/// Records `response_status` (or `response_errors`) for each response.
pub struct MetricsHook {
    metrics: Arc<ProxyMetrics>,
}

impl MetricsHook {
    pub fn new(metrics: Arc<ProxyMetrics>) -> Self {
        Self { metrics }
    }
}

impl ModifyResponse for MetricsHook {
    fn modify(
        &self,
        response: Response<Body>,
        request: &OriginalRequest,
    ) -> Result<Response<Body>, HookError> {
        let status = response.status();
        tracing::info!(status = status.as_u16(), "Upstream returned status code");

        match request_target_path(&request.target) {
            Ok(path) => self.metrics.record_response_status(status, &path),
            Err(e) => {
                tracing::debug!(target_uri = %request.target, error = %e, "Unparseable request target");
                self.metrics.record_response_error();
            }
        }
        Ok(response)
    }
}

/// Convert a client response into one axum can serve.
pub fn from_upstream(response: Response<Incoming>) -> Response<Body> {
    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(body))
}

/// Prepare an upstream response for the client.
pub fn relay(response: Response<Body>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, body)
}

/// Response returned when the upstream cannot be reached.
pub fn bad_gateway() -> Response<Body> {
    StatusCode::BAD_GATEWAY.into_response()
}

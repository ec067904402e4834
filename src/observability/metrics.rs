//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Count proxied request paths, bounded to a fixed monitored set
//! - Count upstream response statuses per request path
//! - Count request targets that could not be parsed for metrics
//! - Render all counters in the Prometheus text format
//!
//! # Metrics
//! - `request_url_path{path}` (counter): every request increments
//!   `path="unmonitored"`; monitored paths also increment their own label
//! - `response_status{code,path}` (counter): upstream responses by status code
//! - `response_errors` (counter): request targets that failed to parse
//!
//! # Design Decisions
//! - The registry is an owned object, not a process-wide recorder
//! - Counters are atomic; reading renders a snapshot and never mutates
//! - Unmonitored paths share one label to bound cardinality

use std::collections::HashSet;

use axum::http::StatusCode;
use metrics::{Counter, Key, KeyName, Label, Level, Metadata, Recorder, SharedString};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

pub const REQUEST_URL_PATH: &str = "request_url_path";
pub const RESPONSE_STATUS: &str = "response_status";
pub const RESPONSE_ERRORS: &str = "response_errors";

/// Catch-all label value recorded for every request.
pub const UNMONITORED: &str = "unmonitored";

/// Content type of the rendered exposition text.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// IPFS API paths that get a label of their own.
pub const MONITORED_PATHS: [&str; 15] = [
    "/api/v0/pin/add",
    "/api/v0/pin/rm",
    "/api/v0/pin/ls",
    "/api/v0/id",
    "/api/v0/pubsub/ls",
    "/api/v0/pubsub/pub",
    "/api/v0/pubsub/sub",
    "/api/v0/dag/get",
    "/api/v0/dag/put",
    "/api/v0/dag/resolve",
    "/api/v0/block/put",
    "/api/v0/block/get",
    "/api/v0/block/stat",
    "/api/v0/swarm/peers",
    "/api/v0/swarm/connect",
];

/// Registry owning the proxy's counters.
pub struct ProxyMetrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    monitored: HashSet<&'static str>,
    response_errors: Counter,
}

impl ProxyMetrics {
    /// Create a registry with the three counters described.
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        describe(&recorder, REQUEST_URL_PATH, "Proxied request paths.");
        describe(&recorder, RESPONSE_STATUS, "Proxied request's response status.");
        describe(&recorder, RESPONSE_ERRORS, "Proxied request's response errors.");

        // Registered up front so a scrape reports 0 before the first error.
        let response_errors = recorder.register_counter(&Key::from_name(RESPONSE_ERRORS), &metadata());

        Self {
            recorder,
            handle,
            monitored: MONITORED_PATHS.into_iter().collect(),
            response_errors,
        }
    }

    /// Whether `path` has a label of its own in `request_url_path`.
    pub fn is_monitored(&self, path: &str) -> bool {
        self.monitored.contains(path)
    }

    /// Count an inbound request path.
    ///
    /// Monitored paths increment their own label and `unmonitored`;
    /// every other path increments `unmonitored` only.
    pub fn record_request_path(&self, path: &str) {
        if self.is_monitored(path) {
            self.counter(REQUEST_URL_PATH, vec![Label::new("path", path.to_string())])
                .increment(1);
        }
        self.counter(REQUEST_URL_PATH, vec![Label::new("path", UNMONITORED)])
            .increment(1);
    }

    /// Count an upstream response for the given request path.
    pub fn record_response_status(&self, status: StatusCode, path: &str) {
        self.counter(
            RESPONSE_STATUS,
            vec![
                Label::new("code", status.as_u16().to_string()),
                Label::new("path", path.to_string()),
            ],
        )
        .increment(1);
    }

    /// Count a request target that could not be parsed.
    pub fn record_response_error(&self) {
        self.response_errors.increment(1);
    }

    /// Render every counter in the Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    fn counter(&self, name: &'static str, labels: Vec<Label>) -> Counter {
        self.recorder
            .register_counter(&Key::from_parts(name, labels), &metadata())
    }
}

#[cfg(test)]
impl ProxyMetrics {
    pub(crate) fn snapshot(&self) -> crate::observability::snapshot::MetricsSnapshot {
        crate::observability::snapshot::MetricsSnapshot::parse(&self.render())
    }
}

impl Default for ProxyMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

fn describe(recorder: &PrometheusRecorder, name: &'static str, help: &'static str) {
    recorder.describe_counter(KeyName::from(name), None, SharedString::from(help));
}

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (request path, response status and error counters)
//!
//! Consumers:
//!     → stdout log lines
//!     → /metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
#[cfg(test)]
pub(crate) mod snapshot;

pub use metrics::ProxyMetrics;

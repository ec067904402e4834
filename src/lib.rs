//! Reverse proxy for an IPFS HTTP API that records Prometheus metrics.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use http::{Forwarder, HttpServer, Upstream};
pub use lifecycle::Shutdown;
pub use observability::ProxyMetrics;

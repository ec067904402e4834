//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, /metrics route, proxy fallback)
//!     → proxy.rs (Forwarder: metrics + upstream exchange)
//!     → request.rs (rewrite target, strip hop-by-hop headers)
//!     → response.rs (response hook, relay to client)
//!     → Send to client
//! ```

pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use proxy::{ClientError, Forwarder};
pub use request::{OriginalRequest, Upstream};
pub use response::{MetricsHook, ModifyResponse};
pub use server::HttpServer;

//! Stop signal shared by the HTTP server and the process owner.
//!
//! A stop is fire-and-forget. Sending it with nobody listening is fine, and a
//! receiver subscribed after the stop never sees it.

use tokio::sync::broadcast;

use crate::lifecycle::signals;

/// Fans one stop request out to every subscribed server.
pub struct Shutdown {
    stop: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (stop, _) = broadcast::channel(1);
        Self { stop }
    }

    /// A coordinator that stops on SIGINT or SIGTERM.
    ///
    /// Must be called inside the runtime. If the signal handlers cannot be
    /// installed the proxy keeps serving until killed.
    pub fn on_os_signal() -> Self {
        let shutdown = Self::new();
        let stop = shutdown.stop.clone();
        tokio::spawn(async move {
            match signals::wait_for_signal().await {
                Ok(()) => {
                    tracing::info!("Stop signal received");
                    let _ = stop.send(());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for shutdown signals");
                    // Holding `stop` keeps subscribers from seeing a closed channel.
                    std::future::pending::<()>().await;
                }
            }
        });
        shutdown
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.stop.subscribe()
    }

    /// Ask every current subscriber to stop.
    pub fn trigger(&self) {
        let _ = self.stop.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

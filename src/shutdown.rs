//! Shutdown coordination.
//!
//! `ShutdownSignal` is a one-way latch shared by the serving tasks. It is
//! tripped by SIGINT/SIGTERM in production and directly by tests.

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;

/// One-shot, cloneable shutdown trigger
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trip the latch. Repeated calls are no-ops.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Whether shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once shutdown has been requested.
    ///
    /// Returns immediately if the signal was already triggered.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this cannot observe a closed channel.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }

    /// Trip the latch when the process receives SIGINT or SIGTERM
    pub fn trigger_on_os_signal(&self) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            os_shutdown_signal().await;
            tracing::info!("Received shutdown signal, draining webhook server");
            this.trigger();
        })
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot drain
/// gracefully without them.
#[allow(clippy::expect_used)]
pub async fn os_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

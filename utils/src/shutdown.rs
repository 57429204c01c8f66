//! Graceful shutdown controller for the kiosk daemon.
//!
//! Listens for SIGINT/SIGTERM and broadcasts a shutdown signal to the
//! orchestrator and the status server. A component that starts listening
//! after shutdown was triggered still observes it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;

/// Coordinates graceful shutdown across the orchestrator and the status server.
///
/// Long-running loops `select!` on [`wait`](Self::wait) (or on a raw
/// [`subscribe`](Self::subscribe) receiver). Triggering is one-shot: the
/// first call to [`shutdown`](Self::shutdown) notifies, later calls are
/// no-ops.
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    /// Get a receiver that will be notified on shutdown.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Trigger shutdown programmatically. Returns `false` if it already was.
    pub fn shutdown(&self) -> bool {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return false;
        }
        let listeners = self.tx.send(()).unwrap_or(0);
        tracing::info!(listeners, "shutdown triggered");
        true
    }

    /// Resolve once shutdown has been triggered, including before the call.
    pub async fn wait(&self) {
        // Subscribe before checking the flag so a concurrent trigger is not missed.
        let mut rx = self.tx.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Trigger shutdown when `trigger` completes. The trigger's output names
    /// the cause in the log.
    pub async fn shutdown_on<F>(&self, trigger: F)
    where
        F: Future<Output = &'static str>,
    {
        tokio::select! {
            cause = trigger => {
                tracing::info!(cause, "shutting down");
                self.shutdown();
            }
            _ = self.wait() => {}
        }
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown. Returns early if
    /// shutdown is triggered some other way.
    pub async fn wait_for_signal(&self) {
        self.shutdown_on(os_signal()).await;
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

async fn os_signal() -> &'static str {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

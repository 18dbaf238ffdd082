use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handles orderly shutdown of an interactive session
///
/// This module orchestrates shutdown by:
/// 1. Waiting for CTRL+C, SIGTERM, or the session ending on its own (quit)
/// 2. Signalling background tasks (scroll feed, fetch runner, renderer) to stop
/// 3. Waiting for them to finish; the fetch runner waits for the fetches it started
pub struct ShutdownCoordinator {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    /// Create a coordinator and the receiver background tasks listen on
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                tasks: Vec::new(),
                shutdown_tx,
            },
            shutdown_rx,
        )
    }

    /// Track a task that must be joined before the process exits
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    /// Wait until a signal arrives or `session` completes, then stop
    /// every tracked task
    pub async fn wait_for_shutdown<F>(self, session: F)
    where
        F: Future<Output = ()>,
    {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for CTRL+C: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received CTRL+C signal, shutting down...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, shutting down...");
            }
            _ = session => {
                info!("Session ended, shutting down...");
            }
        }

        self.shutdown().await
    }

    async fn shutdown(self) {
        if let Err(e) = self.shutdown_tx.send(true) {
            // every receiver is gone, so the tasks have already stopped
            info!("No task was listening for shutdown: {:?}", e);
        }

        let total = self.tasks.len();
        info!("Waiting for {} background tasks to stop...", total);
        for (i, (name, handle)) in self.tasks.into_iter().enumerate() {
            match handle.await {
                Ok(()) => info!("{} stopped ({}/{})", name, i + 1, total),
                Err(e) => error!("{} failed to stop: {:?}", name, e),
            }
        }
        info!("Shutdown completed");
    }
}

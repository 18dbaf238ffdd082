use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::controller::{FetchOutcome, ListingController};

/// Turns sentinel signals into `load_next_page` calls
///
/// The sentinel is whatever tells us the bottom of the list is visible: an
/// intersection observer, a "Load more" button, a `more` command in the
/// terminal. It may fire again while a page is still loading; those signals
/// are absorbed by the controller's in-flight guard.
pub struct ScrollFeed {
    controller: ListingController,
}

impl ScrollFeed {
    pub fn new(controller: ListingController) -> Self {
        Self { controller }
    }

    /// Run until shutdown is signalled or every sentinel sender is gone
    ///
    /// Fetches are spawned so the feed keeps draining signals while a page
    /// loads. Pending fetches are awaited before returning.
    pub async fn run(
        &self,
        mut sentinel: mpsc::Receiver<()>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Scroll feed started");
        let mut pending: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                signal = sentinel.recv() => match signal {
                    Some(()) => {
                        let fetch = self.controller.load_next_page();
                        let Some(page) = fetch.request().map(|request| request.page) else {
                            debug!("Sentinel fired while loading or exhausted, ignoring");
                            continue;
                        };

                        pending.push(tokio::spawn(async move {
                            match fetch.await {
                                FetchOutcome::Loaded { added, total, .. } => {
                                    info!("Scroll feed: page {} added {} of {} jobs", page, added, total)
                                }
                                FetchOutcome::Failed { error, .. } => {
                                    error!("Scroll feed: page {} failed: {}", page, error)
                                }
                                other => debug!("Scroll feed: page {} ended as {:?}", page, other),
                            }
                        }));
                    }
                    None => {
                        info!("Sentinel channel closed");
                        break;
                    }
                },
                _ = shutdown_rx.changed() => {
                    info!("Scroll feed received shutdown signal");
                    break;
                }
            }
            pending.retain(|handle| !handle.is_finished());
        }

        for handle in pending {
            if let Err(e) = handle.await {
                error!("Scroll feed fetch task failed: {:?}", e);
            }
        }
        info!("Scroll feed stopped");
    }
}

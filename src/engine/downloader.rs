// Fetch driver — runs one source retrieval as a cancellable task and exposes its events.

use std::sync::Arc;

use reqwest::Url;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::stats::StatsCollector;
use crate::error::FetchError;
use crate::source::traits::{FetchEvent, ImageSource, ProgressReporter};

/// Event stream of a running fetch. Ends with exactly one
/// `Completed` or `Failed` event. Dropping the handle cancels the fetch.
pub struct FetchHandle {
    events: mpsc::UnboundedReceiver<FetchEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl FetchHandle {
    /// Next event, or `None` once the terminal event has been taken.
    pub async fn next(&mut self) -> Option<FetchEvent> {
        if self.finished {
            return None;
        }
        match self.events.recv().await {
            Some(event) => {
                if !matches!(event, FetchEvent::Progress(_)) {
                    self.finished = true;
                }
                Some(event)
            }
            None => {
                // Task vanished without a terminal event (runtime shutdown).
                self.finished = true;
                Some(FetchEvent::Failed(FetchError::Cancelled))
            }
        }
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct Downloader {
    source: Arc<dyn ImageSource>,
    stats: Arc<StatsCollector>,
    shutdown_token: CancellationToken,
}

impl Downloader {
    pub fn new(source: Arc<dyn ImageSource>, stats: Arc<StatsCollector>) -> Self {
        Self {
            source,
            stats,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Cancel every running fetch and refuse new ones.
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Spawn a fetch of `url`. Cancelling `cancel` (or shutting the
    /// downloader down) ends the stream with `FetchError::Cancelled`.
    pub fn start(&self, url: Url, cancel: CancellationToken) -> FetchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = FetchHandle {
            events: rx,
            cancel: cancel.clone(),
            finished: false,
        };

        if self.shutdown_token.is_cancelled() {
            debug!("fetch {} refused: shutdown in progress", url);
            let _ = tx.send(FetchEvent::Failed(FetchError::Cancelled));
            return handle;
        }

        self.stats.record_fetch_started();

        let source = Arc::clone(&self.source);
        let stats = Arc::clone(&self.stats);
        let shutdown_token = self.shutdown_token.clone();

        tokio::spawn(async move {
            let reporter = ProgressReporter::new(tx.clone());

            let result = tokio::select! {
                result = source.fetch(&url, &reporter) => result,
                _ = cancel.cancelled() => {
                    debug!("fetch {} cancelled", url);
                    Err(FetchError::Cancelled)
                }
                _ = shutdown_token.cancelled() => {
                    debug!("fetch {} cancelled by shutdown", url);
                    Err(FetchError::Cancelled)
                }
            };

            let event = match result {
                Ok(bytes) => {
                    stats.record_fetch_finished(Some(bytes.len() as u64));
                    debug!("fetch {} downloaded ({} bytes)", url, bytes.len());
                    FetchEvent::Completed(bytes)
                }
                Err(e) => {
                    stats.record_fetch_finished(None);
                    debug!("fetch {} failed: {}", url, e);
                    FetchEvent::Failed(e)
                }
            };
            // Receiver may be gone if the session was dropped.
            let _ = tx.send(event);
        });

        handle
    }
}

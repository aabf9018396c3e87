use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use tokio::sync::mpsc;

use crate::error::FetchError;

/// One step of a fetch as seen by its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Progress(u8),
    Completed(Bytes),
    Failed(FetchError),
}

/// Handed to a source so it can publish progress while it downloads.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<FetchEvent>,
}

impl ProgressReporter {
    pub fn new(tx: mpsc::UnboundedSender<FetchEvent>) -> Self {
        Self { tx }
    }

    /// Publish a percentage; values above 100 are clamped.
    pub fn report(&self, percent: u8) {
        let _ = self.tx.send(FetchEvent::Progress(percent.min(100)));
    }

    /// Publish progress from a byte count against a known total, floored.
    pub fn report_bytes(&self, received: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (received.saturating_mul(100) / total).min(100) as u8;
        self.report(percent);
    }
}

/// A single network retrieval. Implementations know nothing about caching or
/// coalescing and must not retry.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn fetch(&self, url: &Url, progress: &ProgressReporter) -> Result<Bytes, FetchError>;
}

// Image loader service — owns the cache, registry and downloader shared by all sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cache::DiskCache;
use super::downloader::Downloader;
use super::key::{derive_key, normalize_url, ContentKey};
use super::readers::ReaderTable;
use super::registry::{InFlightRegistry, SessionId};
use super::request::RequestConfig;
use super::session::{Session, SessionReport};
use super::stats::{StatsCollector, StatsSnapshot};
use crate::config::EngineConfig;
use crate::error::LoadError;
use crate::source::http_source::HttpSource;
use crate::source::traits::ImageSource;

pub(crate) struct LoaderContext {
    pub(crate) config: EngineConfig,
    pub(crate) cache: DiskCache,
    pub(crate) registry: Arc<InFlightRegistry>,
    pub(crate) readers: Arc<ReaderTable>,
    pub(crate) downloader: Downloader,
    pub(crate) stats: Arc<StatsCollector>,
    next_id: AtomicU64,
}

/// Entry point for loading images. Cheap to clone; clones share one cache,
/// one in-flight registry and one downloader.
#[derive(Clone)]
pub struct ImageLoader {
    ctx: Arc<LoaderContext>,
}

impl ImageLoader {
    /// Loader fetching over HTTP(S).
    pub fn new(config: EngineConfig) -> Result<Self> {
        let source = Arc::new(HttpSource::new(&config)?);
        Ok(Self::with_source(config, source))
    }

    /// Loader fetching through a custom source.
    pub fn with_source(config: EngineConfig, source: Arc<dyn ImageSource>) -> Self {
        let stats = Arc::new(StatsCollector::new());
        let downloader = Downloader::new(source, Arc::clone(&stats));
        let cache = DiskCache::new(config.cache_dir.clone());
        let readers = Arc::new(ReaderTable::new(cache.clone()));

        info!(
            "image loader ready cache_dir={} dispose_grace_ms={}",
            cache.dir().display(),
            config.dispose_grace_ms
        );

        Self {
            ctx: Arc::new(LoaderContext {
                config,
                cache,
                registry: Arc::new(InFlightRegistry::new()),
                readers,
                downloader,
                stats,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Spawn a session for `request` and return a handle to it.
    pub fn start(&self, request: RequestConfig) -> SessionHandle {
        let (id, session, cancel) = self.new_session(request);
        let grace = Duration::from_millis(self.ctx.config.dispose_grace_ms);

        let task = tokio::spawn(async move {
            let report = session.run().await;
            // Let any transition the sink started settle before release.
            if !grace.is_zero() {
                tokio::time::sleep(grace).await;
            }
            report
        });

        SessionHandle { id, cancel, task }
    }

    /// Run a session on the current task and wait for it to finish.
    pub async fn run(&self, request: RequestConfig) -> SessionReport {
        let (_, session, _) = self.new_session(request);
        session.run().await
    }

    fn new_session(&self, request: RequestConfig) -> (SessionId, Session, CancellationToken) {
        let id = self.ctx.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let session = Session::new(id, request, Arc::clone(&self.ctx), cancel.clone());
        (id, session, cancel)
    }

    /// Content key the loader would use for `url`.
    pub fn key_for(&self, url: &str) -> Result<ContentKey, LoadError> {
        normalize_url(url).map(|url| derive_key(&url))
    }

    pub fn cache(&self) -> &DiskCache {
        &self.ctx.cache
    }

    pub fn registry(&self) -> &Arc<InFlightRegistry> {
        &self.ctx.registry
    }

    pub fn readers(&self) -> &Arc<ReaderTable> {
        &self.ctx.readers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx.stats.snapshot()
    }

    /// Cancel all running fetches; sessions waiting on them fail.
    pub fn shutdown(&self) {
        info!("image loader shutting down");
        self.ctx.downloader.shutdown();
    }
}

/// Handle to a spawned session.
pub struct SessionHandle {
    id: SessionId,
    cancel: CancellationToken,
    task: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Cancel the session. A coalesced session stops waiting; an owning
    /// session cancels the fetch and its waiters fail with a cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<SessionReport> {
        let id = self.id;
        self.task
            .await
            .map_err(|e| anyhow!("session {} task failed: {}", id, e))
    }
}

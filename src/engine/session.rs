// Session state machine — one request from validation through delivery to the end hook.

use std::fmt;
use std::time::Duration;
use std::sync::Arc;

use reqwest::Url;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::key::{derive_key, normalize_url, ContentKey};
use super::loader::LoaderContext;
use super::progress::ProgressGate;
use super::readers::ReadHold;
use super::registry::{Admission, FetchLease, SessionId, Subscription};
use super::request::RequestConfig;
use super::sink::PlaceholderKind;
use crate::detect::format::Artifact;
use crate::error::{FetchError, LoadError};
use crate::source::traits::FetchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Validating,
    CacheHit,
    Coalescing,
    Fetching,
    Applying,
    Error,
    ApplyingErrorPlaceholder,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Loaded,
    Failed(LoadError),
}

/// What a finished session reports back to whoever started it.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub id: SessionId,
    /// `None` when the URL never validated.
    pub key: Option<ContentKey>,
    /// Every state entered, in order, starting at `Idle`.
    pub states: Vec<SessionState>,
    pub outcome: SessionOutcome,
}

impl SessionReport {
    pub fn is_loaded(&self) -> bool {
        self.outcome == SessionOutcome::Loaded
    }

    pub fn error(&self) -> Option<&LoadError> {
        match &self.outcome {
            SessionOutcome::Failed(err) => Some(err),
            SessionOutcome::Loaded => None,
        }
    }

    pub fn visited(&self, state: SessionState) -> bool {
        self.states.contains(&state)
    }
}

pub(crate) struct Session {
    id: SessionId,
    config: RequestConfig,
    ctx: Arc<LoaderContext>,
    cancel: CancellationToken,
    states: Vec<SessionState>,
    key: Option<ContentKey>,
    hold: Option<ReadHold>,
    progress: ProgressGate,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        config: RequestConfig,
        ctx: Arc<LoaderContext>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            config,
            ctx,
            cancel,
            states: vec![SessionState::Idle],
            key: None,
            hold: None,
            progress: ProgressGate::new(),
        }
    }

    /// Drive the session to `Finished`. Never fails: errors are delivered
    /// through the hooks and sink and recorded in the report.
    pub(crate) async fn run(mut self) -> SessionReport {
        self.enter(SessionState::Validating);

        let outcome = match self.drive().await {
            Ok(()) => SessionOutcome::Loaded,
            Err(err) => {
                self.fail(&err);
                SessionOutcome::Failed(err)
            }
        };

        self.finish();

        SessionReport {
            id: self.id,
            key: self.key,
            states: self.states,
            outcome,
        }
    }

    async fn drive(&mut self) -> Result<(), LoadError> {
        let url = self.validate()?;
        let key = derive_key(&url);
        self.key = Some(key.clone());
        // Held until Finished; an uncached request purges the entry only once
        // every session reading this key is done with it.
        self.hold = Some(self.ctx.readers.hold(&key, !self.config.cached));
        self.step(format_args!("url={} key={}", url, key));

        if let (Some(placeholder), Some(sink)) =
            (&self.config.loading_placeholder, &self.config.sink)
        {
            sink.on_placeholder(placeholder, PlaceholderKind::Loading, Duration::ZERO);
        }
        self.config.hooks.start();

        if self.ctx.cache.exists(&key) {
            self.cache_hit();
            return self.apply(&key);
        }

        let admission = self.ctx.registry.try_begin_or_join(&key, self.id);
        match admission {
            Admission::Joined(subscription) => self.coalesce(subscription).await?,
            Admission::Begin(lease) => self.fetch(&url, lease).await?,
        }

        self.apply(&key)
    }

    fn validate(&self) -> Result<Url, LoadError> {
        let raw = self.config.url.as_deref().ok_or(LoadError::MissingUrl)?;
        let url = normalize_url(raw)?;

        if self.config.sink.is_none() {
            warn!(
                "session {} has no sink attached; {} will be fetched but never shown",
                self.id, url
            );
        }
        Ok(url)
    }

    fn cache_hit(&mut self) {
        self.enter(SessionState::CacheHit);
        self.ctx.stats.record_cache_hit();
        self.config.hooks.downloaded();
    }

    async fn coalesce(&mut self, mut subscription: Subscription) -> Result<(), LoadError> {
        self.enter(SessionState::Coalescing);
        self.ctx.stats.record_coalesced();

        let outcome = tokio::select! {
            outcome = subscription.wait() => Some(outcome),
            _ = self.cancel.cancelled() => None,
        };

        match outcome {
            Some(outcome) => outcome?,
            None => {
                subscription.leave();
                return Err(FetchError::Cancelled.into());
            }
        }

        self.config.hooks.downloaded();
        Ok(())
    }

    async fn fetch(&mut self, url: &Url, lease: FetchLease) -> Result<(), LoadError> {
        let key = lease.key().clone();

        // Another owner may have finished between the cache check and our admission.
        if self.ctx.cache.exists(&key) {
            lease.complete(Ok(()));
            self.cache_hit();
            return Ok(());
        }

        self.enter(SessionState::Fetching);
        match self.download(url, &key).await {
            Ok(()) => {
                self.config.hooks.downloaded();
                let waiters = lease.complete(Ok(()));
                self.step(format_args!("fetch complete, notified {} waiters", waiters.len()));
                Ok(())
            }
            Err(err) => {
                let waiters = lease.complete(Err(err.clone()));
                self.step(format_args!("fetch failed, notified {} waiters", waiters.len()));
                Err(err.into())
            }
        }
    }

    /// Run the fetch to completion and store the bytes. Nothing reaches the
    /// cache unless the whole body arrived.
    async fn download(&mut self, url: &Url, key: &ContentKey) -> Result<(), FetchError> {
        let mut handle = self
            .ctx
            .downloader
            .start(url.clone(), self.cancel.child_token());

        while let Some(event) = handle.next().await {
            match event {
                FetchEvent::Progress(percent) => self.report_progress(percent),
                FetchEvent::Completed(bytes) => {
                    self.ctx
                        .cache
                        .write(key, &bytes)
                        .map_err(|e| FetchError::Storage(e.to_string()))?;
                    self.finish_progress();
                    return Ok(());
                }
                FetchEvent::Failed(err) => return Err(err),
            }
        }

        Err(FetchError::Cancelled)
    }

    fn apply(&mut self, key: &ContentKey) -> Result<(), LoadError> {
        self.enter(SessionState::Applying);
        self.finish_progress();

        let bytes = self.ctx.cache.read(key)?;
        let artifact = Artifact::decode(bytes)?;

        if let Some(sink) = &self.config.sink {
            sink.on_artifact(&artifact, self.config.fade);
        }
        self.config.hooks.loaded();
        self.step(format_args!(
            "artifact delivered format={:?} bytes={}",
            artifact.format(),
            artifact.len()
        ));
        Ok(())
    }

    fn fail(&mut self, err: &LoadError) {
        self.enter(SessionState::Error);

        let message = err.to_string();
        match err {
            LoadError::Fetch(fetch) if fetch.is_cancelled() => {
                info!("session {} cancelled", self.id)
            }
            _ => warn!("session {} error: {}", self.id, message),
        }

        self.config.hooks.error(&message);
        if let Some(sink) = &self.config.sink {
            sink.on_error(&message);
        }

        if let (Some(placeholder), Some(sink)) =
            (self.config.error_placeholder.clone(), self.config.sink.clone())
        {
            self.enter(SessionState::ApplyingErrorPlaceholder);
            sink.on_placeholder(&placeholder, PlaceholderKind::Error, self.config.fade);
        }
    }

    fn finish(&mut self) {
        self.enter(SessionState::Finished);

        // Last reader out deletes the entry if any reader asked for that.
        drop(self.hold.take());

        self.config.hooks.end();
        self.ctx.stats.record_session_finished();
    }

    fn report_progress(&mut self, percent: u8) {
        if let Some(percent) = self.progress.offer(percent) {
            self.publish_progress(percent);
        }
    }

    fn finish_progress(&mut self) {
        if let Some(percent) = self.progress.finish() {
            self.publish_progress(percent);
        }
    }

    fn publish_progress(&self, percent: u8) {
        self.config.hooks.progress(percent);
        if let Some(sink) = &self.config.sink {
            sink.on_progress(percent);
        }
        self.step(format_args!("progress {}%", percent));
    }

    fn enter(&mut self, state: SessionState) {
        self.states.push(state);
        self.step(format_args!("-> {:?}", state));
    }

    fn step(&self, message: fmt::Arguments<'_>) {
        if self.config.log {
            info!("session {}: {}", self.id, message);
        } else {
            debug!("session {}: {}", self.id, message);
        }
    }
}

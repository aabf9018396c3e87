// Request configuration — fluent builder producing an immutable per-session config.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::sink::ConsumerSink;
use crate::config::DEFAULT_FADE_MS;
use crate::detect::format::Artifact;

pub type Hook = Arc<dyn Fn() + Send + Sync>;
pub type ProgressHook = Arc<dyn Fn(u8) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle callbacks. Each is optional.
#[derive(Clone, Default)]
pub struct Hooks {
    pub on_start: Option<Hook>,
    pub on_downloaded: Option<Hook>,
    pub on_progress: Option<ProgressHook>,
    pub on_loaded: Option<Hook>,
    pub on_error: Option<ErrorHook>,
    pub on_end: Option<Hook>,
}

impl Hooks {
    pub(crate) fn start(&self) {
        if let Some(hook) = &self.on_start {
            hook();
        }
    }

    pub(crate) fn downloaded(&self) {
        if let Some(hook) = &self.on_downloaded {
            hook();
        }
    }

    pub(crate) fn progress(&self, percent: u8) {
        if let Some(hook) = &self.on_progress {
            hook(percent);
        }
    }

    pub(crate) fn loaded(&self) {
        if let Some(hook) = &self.on_loaded {
            hook();
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if let Some(hook) = &self.on_error {
            hook(message);
        }
    }

    pub(crate) fn end(&self) {
        if let Some(hook) = &self.on_end {
            hook();
        }
    }
}

/// Everything a session needs, fixed before it starts.
#[derive(Clone)]
pub struct RequestConfig {
    pub(crate) url: Option<String>,
    pub(crate) cached: bool,
    pub(crate) loading_placeholder: Option<Artifact>,
    pub(crate) error_placeholder: Option<Artifact>,
    pub(crate) fade: Duration,
    pub(crate) log: bool,
    pub(crate) hooks: Hooks,
    pub(crate) sink: Option<Arc<dyn ConsumerSink>>,
}

impl RequestConfig {
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn cached(&self) -> bool {
        self.cached
    }

    pub fn fade(&self) -> Duration {
        self.fade
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("url", &self.url)
            .field("cached", &self.cached)
            .field("loading_placeholder", &self.loading_placeholder.is_some())
            .field("error_placeholder", &self.error_placeholder.is_some())
            .field("fade", &self.fade)
            .field("log", &self.log)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// Chained builder for a [`RequestConfig`].
///
/// ```no_run
/// # use std::time::Duration;
/// # use ma_image_loader::{ImageLoader, ImageRequest};
/// # async fn demo(loader: ImageLoader) {
/// let request = ImageRequest::load("https://example.com/avatar.png")
///     .fade_time(Duration::ZERO)
///     .cached(false)
///     .on_end(|| println!("done"))
///     .build();
/// let report = loader.run(request).await;
/// # }
/// ```
#[derive(Clone)]
pub struct ImageRequest {
    config: RequestConfig,
}

impl ImageRequest {
    pub fn new() -> Self {
        Self {
            config: RequestConfig {
                url: None,
                cached: true,
                loading_placeholder: None,
                error_placeholder: None,
                fade: Duration::from_millis(DEFAULT_FADE_MS),
                log: false,
                hooks: Hooks::default(),
                sink: None,
            },
        }
    }

    pub fn load(url: impl Into<String>) -> Self {
        Self::new().url(url)
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = Some(url.into());
        self
    }

    /// Transition duration handed to the sink. Zero disables fading.
    pub fn fade_time(mut self, fade: Duration) -> Self {
        self.config.fade = fade;
        self
    }

    pub fn into_sink(mut self, sink: Arc<dyn ConsumerSink>) -> Self {
        self.config.sink = Some(sink);
        self
    }

    /// Keep the artifact on disk after the session ends (default `true`).
    pub fn cached(mut self, cached: bool) -> Self {
        self.config.cached = cached;
        self
    }

    pub fn loading_placeholder(mut self, artifact: Artifact) -> Self {
        self.config.loading_placeholder = Some(artifact);
        self
    }

    pub fn error_placeholder(mut self, artifact: Artifact) -> Self {
        self.config.error_placeholder = Some(artifact);
        self
    }

    /// Log this session's lifecycle at `info` instead of `debug`.
    pub fn log(mut self, enable: bool) -> Self {
        self.config.log = enable;
        self
    }

    pub fn on_start(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_start = Some(Arc::new(hook));
        self
    }

    pub fn on_downloaded(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_downloaded = Some(Arc::new(hook));
        self
    }

    pub fn on_progress(mut self, hook: impl Fn(u8) + Send + Sync + 'static) -> Self {
        self.config.hooks.on_progress = Some(Arc::new(hook));
        self
    }

    pub fn on_loaded(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_loaded = Some(Arc::new(hook));
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.config.hooks.on_error = Some(Arc::new(hook));
        self
    }

    pub fn on_end(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.config.hooks.on_end = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> RequestConfig {
        self.config
    }
}

impl Default for ImageRequest {
    fn default() -> Self {
        Self::new()
    }
}

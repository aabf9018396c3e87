// Process-wide loader facade for hosts that want a single shared engine.

use std::sync::OnceLock;

use anyhow::{anyhow, Result};

use crate::config::EngineConfig;
use crate::engine::loader::{ImageLoader, SessionHandle};
use crate::engine::request::RequestConfig;
use crate::engine::stats::StatsSnapshot;

static ENGINE: OnceLock<ImageLoader> = OnceLock::new();

/// Initialize the shared loader. Later calls keep the first loader.
pub fn init_engine(config: EngineConfig) -> Result<()> {
    if ENGINE.get().is_some() {
        return Ok(());
    }
    let loader = ImageLoader::new(config)?;
    let _ = ENGINE.set(loader);
    Ok(())
}

/// Install an already-built loader as the shared one. Returns `false` if a
/// loader was already installed.
pub fn install(loader: ImageLoader) -> bool {
    ENGINE.set(loader).is_ok()
}

pub fn shared() -> Result<ImageLoader> {
    ENGINE
        .get()
        .cloned()
        .ok_or_else(|| anyhow!("image engine not initialized; call init_engine first"))
}

/// Start a session on the shared loader.
pub fn start(request: RequestConfig) -> Result<SessionHandle> {
    Ok(shared()?.start(request))
}

pub fn watch_stats() -> Result<StatsSnapshot> {
    Ok(shared()?.stats())
}

/// Cancel all fetches on the shared loader.
pub fn dispose() {
    if let Some(loader) = ENGINE.get() {
        loader.shutdown();
    }
}

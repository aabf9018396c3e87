use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Name of the directory holding one file per content key.
pub const CACHE_DIR_NAME: &str = "ImageCatch";

/// Application directory under the platform data dir.
pub const APP_DIR_NAME: &str = "ma-image-loader";

/// Default transition (fade) duration handed to sinks, in milliseconds.
pub const DEFAULT_FADE_MS: u64 = 1000;

/// Delay between a session finishing and its task being released (0.5 s).
pub const DISPOSE_GRACE_MS: u64 = 500;

/// Number of digest bytes kept for a content key (128 bits).
pub const KEY_BYTES: usize = 16;

/// Top-level configuration for the image loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory used for cached artifacts.
    pub cache_dir: PathBuf,
    /// Whole-request timeout for a single fetch.
    pub request_timeout_secs: u64,
    /// TCP/TLS connect timeout.
    pub connect_timeout_secs: u64,
    /// Grace period before a finished session is disposed.
    pub dispose_grace_ms: u64,
}

impl EngineConfig {
    /// Config whose cache lives in `<root>/ImageCatch`.
    pub fn with_cache_root(root: impl AsRef<Path>) -> Self {
        Self {
            cache_dir: root.as_ref().join(CACHE_DIR_NAME),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            cache_dir: data_dir.join(APP_DIR_NAME).join(CACHE_DIR_NAME),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            dispose_grace_ms: DISPOSE_GRACE_MS,
        }
    }
}

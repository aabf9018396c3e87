// Content keys — the cache and coalescing identity of a URL.
//
// Algorithm: SHA-256 over the normalized absolute URL string, truncated to the
// first 128 bits and rendered as 32 uppercase hex characters. Changing this
// invalidates every existing cache directory.

use std::fmt;

use reqwest::Url;
use sha2::{Digest, Sha256};

use crate::config::KEY_BYTES;
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parse `raw` as an absolute URL. The parsed form is the normalized URL
/// (lower-cased scheme and host, default port dropped, empty path -> "/").
pub fn normalize_url(raw: &str) -> Result<Url, LoadError> {
    Url::parse(raw.trim()).map_err(|e| LoadError::InvalidUrl(e.to_string()))
}

pub fn derive_key(url: &Url) -> ContentKey {
    let digest = Sha256::digest(url.as_str().as_bytes());
    ContentKey(hex::encode_upper(&digest[..KEY_BYTES]))
}

// On-disk artifact cache — one file per content key, named by the key.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::key::ContentKey;
use crate::error::CacheError;

#[derive(Clone)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Cache rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`: `<dir>/<HEXKEY>`, no extension.
    pub fn path_for(&self, key: &ContentKey) -> PathBuf {
        self.dir.join(key.as_str())
    }

    pub fn exists(&self, key: &ContentKey) -> bool {
        self.path_for(key).is_file()
    }

    pub fn read(&self, key: &ContentKey) -> Result<Vec<u8>, CacheError> {
        let path = self.path_for(key);
        fs::read(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                CacheError::NotFound(key.to_string())
            } else {
                CacheError::Io { path, source: e }
            }
        })
    }

    /// Store `data` under `key`, replacing any existing entry.
    ///
    /// Bytes go to a temp file in the cache directory, are synced, then
    /// renamed into place, so readers see either the old entry or the full
    /// new one.
    pub fn write(&self, key: &ContentKey, data: &[u8]) -> Result<(), CacheError> {
        let io_err = |path: &Path, source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(|e| io_err(&self.dir, e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".partial-")
            .tempfile_in(&self.dir)
            .map_err(|e| io_err(&self.dir, e))?;
        temp.write_all(data).map_err(|e| io_err(temp.path(), e))?;
        temp.as_file().sync_all().map_err(|e| io_err(temp.path(), e))?;

        let path = self.path_for(key);
        temp.persist(&path).map_err(|e| io_err(&path, e.error))?;

        debug!("cache write key={} bytes={}", key, data.len());
        Ok(())
    }

    /// Remove the entry for `key`. Deleting a missing entry succeeds.
    pub fn delete(&self, key: &ContentKey) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("cache delete key={}", key);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io { path, source: e }),
        }
    }
}

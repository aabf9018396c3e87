// Reader holds — keeps a cache entry on disk while any session may still read it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::cache::DiskCache;
use super::key::ContentKey;

struct Readers {
    count: usize,
    purge: bool,
}

/// Per-key count of sessions between key derivation and `Finished`.
///
/// A session that does not want its artifact kept marks the key for purge.
/// The entry is deleted when the last holder of a purge-marked key lets go,
/// so a session that joined a fetch never finds its bytes gone. Acquire and
/// the final delete share one lock; a new holder either sees the file or
/// arrives after it is gone.
pub struct ReaderTable {
    cache: DiskCache,
    readers: Mutex<HashMap<ContentKey, Readers>>,
}

impl ReaderTable {
    pub fn new(cache: DiskCache) -> Self {
        Self {
            cache,
            readers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a reader of `key`. With `purge`, the entry is deleted once
    /// every current reader of the key has released.
    pub fn hold(self: &Arc<Self>, key: &ContentKey, purge: bool) -> ReadHold {
        let mut readers = self.readers.lock();
        let entry = readers.entry(key.clone()).or_insert(Readers {
            count: 0,
            purge: false,
        });
        entry.count += 1;
        entry.purge |= purge;

        ReadHold {
            table: Arc::clone(self),
            key: key.clone(),
        }
    }

    /// Sessions currently holding `key`.
    pub fn holders(&self, key: &ContentKey) -> usize {
        self.readers.lock().get(key).map_or(0, |entry| entry.count)
    }

    fn release(&self, key: &ContentKey) {
        let mut readers = self.readers.lock();
        let Some(entry) = readers.get_mut(key) else {
            return;
        };
        entry.count -= 1;
        if entry.count > 0 {
            return;
        }

        let purge = entry.purge;
        readers.remove(key);
        if purge {
            match self.cache.delete(key) {
                Ok(()) => debug!("purged cache entry key={}", key),
                Err(e) => warn!("could not purge cache entry key={}: {}", key, e),
            }
        }
    }
}

/// Released on drop, including when the session task is aborted.
pub struct ReadHold {
    table: Arc<ReaderTable>,
    key: ContentKey,
}

impl Drop for ReadHold {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ContentKey {
        let url = reqwest::Url::parse(s).unwrap();
        crate::engine::key::derive_key(&url)
    }

    #[test]
    fn test_last_reader_purges() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let table = Arc::new(ReaderTable::new(DiskCache::new(dir.path())));
        let k = key("http://example.com/a.png");
        cache.write(&k, b"data").unwrap();

        let keeper = table.hold(&k, false);
        let purger = table.hold(&k, true);
        assert_eq!(table.holders(&k), 2);

        drop(purger);
        assert!(cache.exists(&k));

        drop(keeper);
        assert!(!cache.exists(&k));
        assert_eq!(table.holders(&k), 0);
    }

    #[test]
    fn test_unmarked_key_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path());
        let table = Arc::new(ReaderTable::new(DiskCache::new(dir.path())));
        let k = key("http://example.com/b.png");
        cache.write(&k, b"data").unwrap();

        drop(table.hold(&k, false));
        assert!(cache.exists(&k));

        // The purge mark does not outlive the group that set it.
        drop(table.hold(&k, true));
        assert!(!cache.exists(&k));
        cache.write(&k, b"data").unwrap();
        drop(table.hold(&k, false));
        assert!(cache.exists(&k));
    }
}

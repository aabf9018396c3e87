// Live loader statistics — fetches, cache hits, coalesced joins, failures, throughput.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

struct StatsSample {
    at: Instant,
    download_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub fetches_started: u64,
    pub fetches_failed: u64,
    pub cache_hits: u64,
    pub coalesced: u64,
    pub sessions_finished: u64,
    pub downloaded_bytes: u64,
    pub download_bps: u64,
    pub active_fetches: u32,
}

pub struct StatsCollector {
    fetches_started: AtomicU64,
    fetches_failed: AtomicU64,
    cache_hits: AtomicU64,
    coalesced: AtomicU64,
    sessions_finished: AtomicU64,
    download_bytes_total: AtomicU64,
    active_fetches: AtomicU32,
    last_sample: Mutex<StatsSample>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            fetches_started: AtomicU64::new(0),
            fetches_failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            sessions_finished: AtomicU64::new(0),
            download_bytes_total: AtomicU64::new(0),
            active_fetches: AtomicU32::new(0),
            last_sample: Mutex::new(StatsSample {
                at: Instant::now(),
                download_bytes: 0,
            }),
        }
    }

    pub fn record_fetch_started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
        self.active_fetches.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the end of a fetch; `bytes` is `None` on failure.
    pub fn record_fetch_finished(&self, bytes: Option<u64>) {
        self.active_fetches.fetch_sub(1, Ordering::Relaxed);
        match bytes {
            Some(bytes) => {
                self.download_bytes_total.fetch_add(bytes, Ordering::Relaxed);
            }
            None => {
                self.fetches_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_finished(&self) {
        self.sessions_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let current_download = self.download_bytes_total.load(Ordering::Relaxed);

        let download_bps = {
            let mut sample = self.last_sample.lock();
            let elapsed = now.duration_since(sample.at).as_secs_f64();
            let bps = if elapsed > 0.1 {
                ((current_download - sample.download_bytes) as f64 / elapsed) as u64
            } else {
                0
            };

            // Update sample for next call
            sample.at = now;
            sample.download_bytes = current_download;
            bps
        };

        StatsSnapshot {
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            sessions_finished: self.sessions_finished.load(Ordering::Relaxed),
            downloaded_bytes: current_download,
            download_bps,
            active_fetches: self.active_fetches.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

// Engine orchestration — session lifecycle, coalescing and cache coordination.

pub mod cache;
pub mod downloader;
pub mod key;
pub mod loader;
pub mod progress;
pub mod readers;
pub mod registry;
pub mod request;
pub mod session;
pub mod sink;
pub mod stats;

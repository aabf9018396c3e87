// Image fetch engine — coalesced downloads, content-addressed disk cache, sink delivery.

pub mod api;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod source;

pub use config::EngineConfig;
pub use detect::format::{Artifact, ImageFormat};
pub use engine::loader::{ImageLoader, SessionHandle};
pub use engine::request::{ImageRequest, RequestConfig};
pub use engine::session::{SessionOutcome, SessionReport, SessionState};
pub use engine::sink::{ConsumerSink, PlaceholderKind};
pub use error::{CacheError, DecodeError, FetchError, LoadError};

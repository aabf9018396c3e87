// Image sources — pluggable fetch backends (HTTP, in-process fakes).

pub mod http_source;
pub mod traits;

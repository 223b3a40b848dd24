pub mod core;
pub mod error;
pub mod handler;
pub mod upstream;

pub use crate::core::{Core, CoreState};
pub use crate::error::{ProxyError, UpstreamPassthroughError};
pub use crate::upstream::{ByteStream, GeminiUpstream, Upstream};

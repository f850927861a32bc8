//! Upstream-facing layer: payload models and the streaming HTTP client.

pub mod models;
pub mod upstream;

pub use models::{
    ChatCompletionChunk, ChatCompletionRequest, ConciseChunk, Message, Role, Usage,
};
pub use upstream::{ChunkStream, UpstreamClient};

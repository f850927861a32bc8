//! LLM Stream Relay - a synchronous pipeline for streamed LLM responses
//!
//! This library turns a streamed chat completion body into typed events:
//!
//! - **SSE Frame Decoding**: `text/event-stream` records from any blocking byte source
//! - **Typed Event Streams**: strict JSON chunk decoding with `[DONE]` draining and
//!   upstream error detection
//! - **Reasoning Splitting**: `<think>...</think>` blocks separated from answer text,
//!   even when markers are cut across fragments
//! - **Relay**: Perplexity concise and OpenAI-compatible streams delivered to an event sink
//!
//! # Architecture
//!
//! - [`stream`]: the decode pipeline (frame decoder, typed stream, think splitter)
//! - [`api`]: payload models and the blocking upstream client
//! - [`services`]: the relay that drives a stream into a sink
//! - [`core`]: configuration, errors and logging
//!
//! # Configuration
//!
//! All settings have defaults. Optional environment variables:
//! - `PERPLEXITY_URL`: concise-mode endpoint (default: https://api.perplexity.ai/chat/completions)
//! - `VERIFY_SSL`: Verify SSL certificates for upstream (default: true)
//! - `REQUEST_TIMEOUT_SECS`: Request timeout in seconds (default: 300)
//! - `MAX_LINE_BYTES`: Longest accepted SSE line (default: 32 MiB)
//! - `RUST_LOG`, `NO_COLOR`, `LOG_JSON`: logging output

pub mod api;
pub mod core;
pub mod services;
pub mod stream;

// Re-export commonly used types for convenience
pub use api::{ChatCompletionRequest, ChunkStream, UpstreamClient};
pub use core::{AppConfig, AppError, Result, StreamError};
pub use services::{relay_stream, EventSink, RelayEvent, RelaySummary};
pub use stream::{EventStream, FrameDecoder, Segment, SegmentKind, SplitterState};

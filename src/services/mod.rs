//! Services built on top of the decode pipeline.

pub mod relay;

pub use relay::{relay_stream, ChunkMeta, EventSink, RelayChunk, RelayEvent, RelaySummary};

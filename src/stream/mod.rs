//! Streaming decode pipeline.
//!
//! ```text
//! byte source -> FrameDecoder -> EventStream<T> -> chunk content -> think splitter
//! ```
//!
//! Every stage is synchronous and pull-based: nothing is read until the
//! caller asks for the next item.

pub mod decoder;
pub mod think;
pub mod typed;

pub use decoder::{Event, FrameDecoder, DONE_SENTINEL};
pub use think::{
    coalesce, finalize, split, split_all, Mode, Segment, SegmentKind, SplitterState,
    CLOSE_MARKER, OPEN_MARKER,
};
pub use typed::{EventStream, WRAPPED_EVENT_PREFIX};

//! Relay service: drives a typed chunk stream into an event sink.
//!
//! Answer text is run through the think splitter so `<think>` blocks reach
//! the sink as reasoning segments, with markers removed.

use crate::api::models::{
    ChatCompletionChunk, ConciseChunk, ImageResult, ReasoningStep, SearchResult, Usage,
    OBJECT_COMPLETION_CHUNK, OBJECT_COMPLETION_DONE, OBJECT_REASONING, OBJECT_REASONING_DONE,
};
use crate::core::error::{AppError, Result};
use crate::core::logging::generate_request_id;
use crate::stream::think::{self, Segment, SegmentKind, SplitterState};
use crate::stream::EventStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::sync::mpsc;

/// Identity of the chunk an event was derived from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChunkMeta {
    pub id: String,
    pub model: String,
    pub created: i64,
}

/// Event delivered to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// Incremental reasoning steps
    Reasoning {
        #[serde(flatten)]
        meta: ChunkMeta,
        steps: Vec<ReasoningStep>,
    },
    /// Reasoning phase finished
    ReasoningDone {
        #[serde(flatten)]
        meta: ChunkMeta,
        steps: Vec<ReasoningStep>,
        search_results: Vec<SearchResult>,
        images: Vec<ImageResult>,
    },
    /// A run of answer text, or inline reasoning split out of it
    Completion {
        #[serde(flatten)]
        meta: ChunkMeta,
        segment: Segment,
    },
    /// Final answer with sources and usage
    CompletionDone {
        #[serde(flatten)]
        meta: ChunkMeta,
        content: Option<String>,
        search_results: Vec<SearchResult>,
        images: Vec<ImageResult>,
        usage: Option<Usage>,
    },
}

/// A chunk shape the relay knows how to turn into events.
pub trait RelayChunk {
    /// Upstream label used in the relay span
    const UPSTREAM: &'static str;

    fn meta(&self) -> ChunkMeta;

    /// Convert this chunk into events, feeding answer text through `splitter`.
    fn to_events(&self, splitter: &mut SplitterState) -> Vec<RelayEvent>;

    fn usage(&self) -> Option<&Usage>;
}

impl RelayChunk for ConciseChunk {
    const UPSTREAM: &'static str = "perplexity";

    fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            id: self.id.clone(),
            model: self.model.clone(),
            created: self.created,
        }
    }

    fn to_events(&self, splitter: &mut SplitterState) -> Vec<RelayEvent> {
        match self.object.as_str() {
            OBJECT_REASONING => self.reasoning_events(),
            OBJECT_REASONING_DONE => vec![self.reasoning_done_event()],
            OBJECT_COMPLETION_CHUNK => self.completion_events(splitter),
            OBJECT_COMPLETION_DONE => {
                // Anything still pending belongs before the final event
                let mut events: Vec<RelayEvent> = think::finalize(splitter)
                    .map(|segment| completion_event(self.meta(), segment))
                    .into_iter()
                    .collect();
                events.push(self.completion_done_event());
                events
            }
            other => {
                tracing::warn!(object = %other, id = %self.id, "Unknown chunk type, skipping");
                Vec::new()
            }
        }
    }

    fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

impl ConciseChunk {
    fn reasoning_events(&self) -> Vec<RelayEvent> {
        match self.first_choice().and_then(|choice| choice.delta.as_ref()) {
            Some(delta) if !delta.reasoning_steps.is_empty() => vec![RelayEvent::Reasoning {
                meta: self.meta(),
                steps: delta.reasoning_steps.clone(),
            }],
            _ => Vec::new(),
        }
    }

    fn reasoning_done_event(&self) -> RelayEvent {
        let steps = self
            .first_choice()
            .and_then(|choice| choice.message.as_ref())
            .map(|message| message.reasoning_steps.clone())
            .unwrap_or_default();

        RelayEvent::ReasoningDone {
            meta: self.meta(),
            steps,
            search_results: self.search_results.clone(),
            images: self.images.clone(),
        }
    }

    fn completion_events(&self, splitter: &mut SplitterState) -> Vec<RelayEvent> {
        match self.first_choice().and_then(|choice| choice.delta.as_ref()) {
            Some(delta) if !delta.content.is_empty() => {
                split_events(self.meta(), splitter, &delta.content)
            }
            _ => Vec::new(),
        }
    }

    fn completion_done_event(&self) -> RelayEvent {
        let content = self
            .first_choice()
            .and_then(|choice| choice.message.as_ref())
            .map(|message| message.content.clone());

        RelayEvent::CompletionDone {
            meta: self.meta(),
            content,
            search_results: self.search_results.clone(),
            images: self.images.clone(),
            usage: self.usage.clone(),
        }
    }
}

impl RelayChunk for ChatCompletionChunk {
    const UPSTREAM: &'static str = "openai";

    fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            id: self.id.clone(),
            model: self.model.clone(),
            created: self.created,
        }
    }

    fn to_events(&self, splitter: &mut SplitterState) -> Vec<RelayEvent> {
        match self.delta_content() {
            Some(content) if !content.is_empty() => split_events(self.meta(), splitter, content),
            _ => Vec::new(),
        }
    }

    fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

fn completion_event(meta: ChunkMeta, segment: Segment) -> RelayEvent {
    RelayEvent::Completion { meta, segment }
}

fn split_events(meta: ChunkMeta, splitter: &mut SplitterState, content: &str) -> Vec<RelayEvent> {
    think::split(splitter, content)
        .into_iter()
        .map(|segment| completion_event(meta.clone(), segment))
        .collect()
}

/// Destination for relayed events.
pub trait EventSink {
    fn emit(&mut self, event: RelayEvent) -> Result<()>;
}

impl EventSink for Vec<RelayEvent> {
    fn emit(&mut self, event: RelayEvent) -> Result<()> {
        self.push(event);
        Ok(())
    }
}

impl EventSink for mpsc::Sender<RelayEvent> {
    fn emit(&mut self, event: RelayEvent) -> Result<()> {
        mpsc::Sender::send(self, event).map_err(|_| AppError::SinkClosed)
    }
}

/// Counters collected while relaying one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelaySummary {
    pub request_id: String,
    pub chunks: usize,
    pub events: usize,
    pub answer_chars: usize,
    pub reasoning_chars: usize,
    /// Whether the `[DONE]` sentinel was seen
    pub done: bool,
    pub usage: Option<Usage>,
}

impl RelaySummary {
    fn record(&mut self, event: &RelayEvent) {
        self.events += 1;
        if let RelayEvent::Completion { segment, .. } = event {
            let chars = segment.text.chars().count();
            match segment.kind {
                SegmentKind::Answer => self.answer_chars += chars,
                SegmentKind::Reasoning => self.reasoning_chars += chars,
            }
        }
    }
}

/// Relay every chunk of `stream` into `sink`.
///
/// The splitter is finalized at end of input, including when the stream
/// failed, and the stream is closed on every path. A sink failure takes
/// precedence over a stream failure.
pub fn relay_stream<T, R, S>(stream: EventStream<T, R>, sink: &mut S) -> Result<RelaySummary>
where
    T: RelayChunk + DeserializeOwned,
    R: Read,
    S: EventSink + ?Sized,
{
    let request_id = generate_request_id();
    let span = crate::relay_span!(T::UPSTREAM, request_id);
    let _guard = span.enter();

    let mut stream = stream;
    let mut splitter = SplitterState::new();
    let mut summary = RelaySummary {
        request_id,
        ..RelaySummary::default()
    };
    let mut last_meta = ChunkMeta::default();

    tracing::info!("Relay started");

    let pumped = pump(&mut stream, sink, &mut splitter, &mut summary, &mut last_meta);
    let flushed = pumped.and_then(|()| match think::finalize(&mut splitter) {
        Some(segment) => {
            let event = completion_event(last_meta, segment);
            summary.record(&event);
            sink.emit(event)
        }
        None => Ok(()),
    });

    summary.done = stream.is_done();
    let finished = stream.finish();

    if let Err(err) = flushed {
        tracing::error!(error = %err, "Relay aborted");
        return Err(err);
    }
    if let Err(err) = finished {
        tracing::error!(category = %err.category(), error = %err, "Relay stream failed");
        return Err(err.into());
    }

    tracing::info!(
        chunks = summary.chunks,
        events = summary.events,
        answer_chars = summary.answer_chars,
        reasoning_chars = summary.reasoning_chars,
        done = summary.done,
        "Relay completed"
    );

    Ok(summary)
}

fn pump<T, R, S>(
    stream: &mut EventStream<T, R>,
    sink: &mut S,
    splitter: &mut SplitterState,
    summary: &mut RelaySummary,
    last_meta: &mut ChunkMeta,
) -> Result<()>
where
    T: RelayChunk + DeserializeOwned,
    R: Read,
    S: EventSink + ?Sized,
{
    while stream.advance() {
        let Some(chunk) = stream.current() else {
            continue;
        };

        summary.chunks += 1;
        *last_meta = chunk.meta();
        if let Some(usage) = chunk.usage() {
            summary.usage = Some(usage.clone());
        }

        tracing::debug!(id = %last_meta.id, "Received chunk");

        for event in chunk.to_events(splitter) {
            summary.record(&event);
            sink.emit(event)?;
        }
    }
    Ok(())
}

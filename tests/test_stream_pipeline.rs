//! End-to-end tests for the decode pipeline over in-memory bodies.

use assert_matches::assert_matches;
use llm_stream_relay::api::models::{ChatCompletionChunk, ConciseChunk};
use llm_stream_relay::core::{ErrorCategoryCode, StreamError};
use llm_stream_relay::stream::{
    coalesce, finalize, split, EventStream, FrameDecoder, Segment, SplitterState,
};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::io::{self, Read};

/// Reader that fails after its payload is consumed, like a dropped connection.
struct DroppedConnection {
    payload: io::Cursor<Vec<u8>>,
}

impl Read for DroppedConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.payload.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection dropped")),
            n => Ok(n),
        }
    }
}

fn chat_chunk(content: &str) -> String {
    format!(
        "data: {{\"id\":\"x\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"m\",\"choices\":[{{\"index\":0,\"delta\":{{\"content\":{}}}}}]}}\n\n",
        serde_json::to_string(content).unwrap()
    )
}

/// Pull every chunk and run its content through a fresh splitter.
fn answer_segments(body: &str) -> (Vec<Segment>, Option<String>) {
    let mut stream: EventStream<ChatCompletionChunk, _> = EventStream::from_reader(body.as_bytes());
    let mut state = SplitterState::new();
    let mut segments = Vec::new();

    while stream.advance() {
        if let Some(content) = stream.current().and_then(|c| c.delta_content()) {
            segments.extend(split(&mut state, content));
        }
    }
    segments.extend(finalize(&mut state));
    (coalesce(segments), stream.err().map(|e| e.to_string()))
}

#[test]
fn test_think_block_across_chunks() {
    let body = [
        chat_chunk("a<thi"),
        chat_chunk("nk>b</think>c"),
        "data: [DONE]\n\n".to_string(),
    ]
    .concat();

    let (segments, err) = answer_segments(&body);
    assert_eq!(
        segments,
        vec![
            Segment::answer("a"),
            Segment::reasoning("b"),
            Segment::answer("c"),
        ]
    );
    assert!(err.is_none());
}

#[test]
fn test_one_character_chunks() {
    let body: String = "X<think>Y</think>Z"
        .chars()
        .map(|ch| chat_chunk(&ch.to_string()))
        .collect();

    let (segments, _) = answer_segments(&body);
    assert_eq!(
        segments,
        vec![
            Segment::answer("X"),
            Segment::reasoning("Y"),
            Segment::answer("Z"),
        ]
    );
}

#[test]
fn test_records_after_done_are_ignored() {
    let body = [
        chat_chunk("kept"),
        "data: [DONE]\n\n".to_string(),
        chat_chunk("dropped"),
        "data: {\"error\":\"ignored after done\"}\n\n".to_string(),
    ]
    .concat();

    let (segments, err) = answer_segments(&body);
    assert_eq!(segments, vec![Segment::answer("kept")]);
    assert!(err.is_none());
}

#[test]
fn test_error_event_after_chunks() {
    let body = [chat_chunk("first"), "data: {\"error\":\"x\"}\n\n".to_string()].concat();
    let mut stream: EventStream<ChatCompletionChunk, _> = EventStream::from_reader(body.as_bytes());

    assert!(stream.advance());
    assert_eq!(
        stream.current().and_then(|c| c.delta_content()),
        Some("first")
    );
    assert!(!stream.advance());
    assert_eq!(
        stream.err().and_then(|e| e.upstream_message()),
        Some("x")
    );
    // The last good chunk stays readable
    assert_eq!(
        stream.current().and_then(|c| c.delta_content()),
        Some("first")
    );
}

#[test]
fn test_schema_drift_is_decode_error() {
    let body = "data: {\"id\":\"x\",\"object\":\"chat.reasoning\",\"created\":1,\"model\":\"sonar\",\"brand_new_field\":[]}\n\n";
    let mut stream: EventStream<ConciseChunk, _> = EventStream::from_reader(body.as_bytes());

    assert!(!stream.advance());
    let err = stream.err().unwrap();
    assert_matches!(err, StreamError::Decode(_));
    assert_eq!(err.category(), ErrorCategoryCode::Decode);
}

#[test]
fn test_dropped_connection_is_frame_read_error() {
    let reader = DroppedConnection {
        payload: io::Cursor::new(chat_chunk("partial").into_bytes()),
    };
    let mut stream: EventStream<ChatCompletionChunk, _> = EventStream::from_reader(reader);

    assert!(stream.advance());
    assert!(!stream.advance());
    assert_matches!(stream.err(), Some(StreamError::FrameRead(_)));
    assert_matches!(stream.finish(), Err(StreamError::FrameRead(_)));
}

#[test]
fn test_line_limit_through_typed_stream() {
    let body = chat_chunk(&"y".repeat(256));
    let decoder = FrameDecoder::with_max_line_bytes(body.as_bytes(), 64);
    let mut stream: EventStream<ChatCompletionChunk, _> = EventStream::new(decoder);

    assert!(!stream.advance());
    let err = stream.err().unwrap();
    assert_matches!(err, StreamError::LineTooLong { limit: 64 });
    assert_eq!(err.category(), ErrorCategoryCode::FrameRead);
}

#[test]
fn test_thread_namespace_wrapping() {
    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RunEvent {
        event: String,
        data: RunData,
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct RunData {
        id: String,
        status: String,
    }

    let body = concat!(
        "event: thread.run.created\n",
        "data: {\"id\":\"run_1\",\"status\":\"queued\"}\n\n",
        "event: thread.run.completed\n",
        "data: {\"id\":\"run_1\",\"status\":\"completed\"}\n\n",
        "data: [DONE]\n\n",
    );
    let mut stream: EventStream<RunEvent, _> = EventStream::from_reader(body.as_bytes());

    let mut seen = Vec::new();
    while stream.advance() {
        let run = stream.current().unwrap();
        assert_eq!(run.data.id, "run_1");
        seen.push((run.event.clone(), run.data.status.clone()));
    }

    assert_eq!(
        seen,
        vec![
            ("thread.run.created".to_string(), "queued".to_string()),
            ("thread.run.completed".to_string(), "completed".to_string()),
        ]
    );
    assert!(stream.finish().is_ok());
}

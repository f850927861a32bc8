//! Typed event stream over an SSE frame decoder.
//!
//! Each record is decoded into a caller-chosen chunk type. Three upstream
//! conventions are applied on the way:
//!
//! - a payload starting with `[DONE]` ends the logical stream, but the
//!   remaining records are still pulled so the connection is drained;
//! - a payload with a top-level `error` key fails the stream with that value;
//! - records typed under the `thread.` namespace are wrapped as
//!   `{"event": <type>, "data": <payload>}` before decoding.
//!
//! Strictness is a property of the chunk type: the payload shapes in
//! [`crate::api::models`] all reject unknown fields.

use super::decoder::{Event, FrameDecoder};
use crate::core::error::StreamError;
use serde::de::{DeserializeOwned, IgnoredAny, MapAccess, Visitor};
use serde::Deserializer;
use serde_json::value::RawValue;
use std::fmt;
use std::io::Read;

/// Event type prefix whose records are decoded through the wrapper object.
pub const WRAPPED_EVENT_PREFIX: &str = "thread.";

/// Generic stream of decoded chunks.
///
/// ```
/// use llm_stream_relay::stream::EventStream;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// #[serde(deny_unknown_fields)]
/// struct Tick {
///     n: u32,
/// }
///
/// let body = "data: {\"n\":1}\n\ndata: {\"n\":2}\n\ndata: [DONE]\n\n";
/// let mut stream = EventStream::<Tick, _>::from_reader(body.as_bytes());
/// let mut seen = Vec::new();
/// while stream.advance() {
///     seen.push(stream.current().map(|tick| tick.n));
/// }
/// assert_eq!(seen, vec![Some(1), Some(2)]);
/// assert!(stream.finish().is_ok());
/// ```
#[derive(Debug)]
pub struct EventStream<T, R> {
    decoder: FrameDecoder<R>,
    current: Option<T>,
    err: Option<StreamError>,
    done: bool,
}

impl<T, R> EventStream<T, R>
where
    T: DeserializeOwned,
    R: Read,
{
    pub fn new(decoder: FrameDecoder<R>) -> Self {
        Self {
            decoder,
            current: None,
            err: None,
            done: false,
        }
    }

    /// Build a stream over a raw byte source with default decoder settings.
    pub fn from_reader(reader: R) -> Self {
        Self::new(FrameDecoder::new(reader))
    }

    /// Advance to the next decoded chunk.
    ///
    /// Returns `false` on clean end of input and on failure; a failure is
    /// kept in [`err`](Self::err) and freezes the stream.
    pub fn advance(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        while self.decoder.advance() {
            if self.done {
                continue;
            }

            let event = self.decoder.event();

            if event.is_done() {
                // Keep pulling so the body is read to the end.
                tracing::debug!("received [DONE], draining remaining records");
                self.done = true;
                continue;
            }

            // Unlike a strict decode of empty input, data-less records such
            // as keep-alives are skipped rather than failing the stream.
            if event.data.is_empty() {
                continue;
            }

            match decode_event(event) {
                Ok(chunk) => {
                    self.current = Some(chunk);
                    return true;
                }
                Err(err) => {
                    tracing::warn!(
                        category = %err.category(),
                        event_type = %event.event_type,
                        error = %err,
                        "event stream failed"
                    );
                    self.err = Some(err);
                    return false;
                }
            }
        }

        // The decoder may have stopped because of an error
        self.err = self.decoder.take_err();
        false
    }

    /// The most recently decoded chunk.
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The terminal error, if any.
    pub fn err(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Release the underlying byte source.
    pub fn close(&mut self) {
        self.decoder.close();
    }

    /// Close the stream and return its terminal error, if any.
    pub fn finish(mut self) -> Result<(), StreamError> {
        self.close();
        match self.err.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Visitor that walks the top-level keys of a payload looking for `error`.
///
/// It stops at the first `error` key, so a payload that is truncated or
/// malformed after that key still yields the upstream message.
struct ErrorKeyScan<'a> {
    found: &'a mut Option<String>,
}

impl<'de, 'a> Visitor<'de> for ErrorKeyScan<'a> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a JSON object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(key) = map.next_key::<String>()? {
            if key == "error" {
                let raw: &'de RawValue = map.next_value()?;
                *self.found = Some(upstream_message(raw));
                return Ok(());
            }
            map.next_value::<IgnoredAny>()?;
        }
        Ok(())
    }
}

/// Message carried by a top-level `error` key, if the payload has one.
fn scan_error_key(data: &[u8]) -> Option<String> {
    let mut found = None;
    let mut de = serde_json::Deserializer::from_slice(data);
    // Anything after the key, including a syntax error, is irrelevant here.
    let _ = (&mut de).deserialize_map(ErrorKeyScan { found: &mut found });
    found
}

/// A string is unescaped, `null` is empty, anything else is the raw text.
fn upstream_message(raw: &RawValue) -> String {
    let text = raw.get();
    if text.starts_with('"') {
        serde_json::from_str(text).unwrap_or_else(|_| text.to_string())
    } else if text == "null" {
        String::new()
    } else {
        text.to_string()
    }
}

fn decode_event<T: DeserializeOwned>(event: &Event) -> Result<T, StreamError> {
    if let Some(message) = scan_error_key(&event.data) {
        return Err(StreamError::Upstream { message });
    }

    if !event.event_type.is_empty() && event.event_type.starts_with(WRAPPED_EVENT_PREFIX) {
        let wrapped = wrap_event(event)?;
        return serde_json::from_slice(&wrapped).map_err(StreamError::Decode);
    }

    serde_json::from_slice(&event.data).map_err(StreamError::Decode)
}

fn wrap_event(event: &Event) -> Result<Vec<u8>, StreamError> {
    let event_type = serde_json::to_string(&event.event_type).map_err(StreamError::Decode)?;

    let mut wrapped = Vec::with_capacity(event.data.len() + event_type.len() + 24);
    wrapped.extend_from_slice(b"{ \"event\": ");
    wrapped.extend_from_slice(event_type.as_bytes());
    wrapped.extend_from_slice(b", \"data\": ");
    wrapped.extend_from_slice(&event.data);
    wrapped.extend_from_slice(b" }");
    Ok(wrapped)
}

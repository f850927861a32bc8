//! SSE frame decoder.
//!
//! Turns a blocking byte source into `(type, data)` records following the
//! `text/event-stream` line format:
//!
//! ```text
//! event: <type>\n
//! data: <payload>\n
//! data: <more payload>\n
//! \n
//! ```
//!
//! A blank line dispatches the accumulated record. Lines starting with `:`
//! are comments, unknown field names are ignored, and a record that is not
//! terminated by a blank line before end of input is dropped.

use crate::core::config::DEFAULT_MAX_LINE_BYTES;
use crate::core::error::StreamError;
use bytes::{BufMut, Bytes, BytesMut};
use std::io::{BufRead, BufReader, Read};

/// Sentinel payload prefix marking the end of meaningful output.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// One dispatched SSE record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    /// Value of the last `event:` field, empty when absent
    pub event_type: String,
    /// Concatenated `data:` values, each followed by `\n`
    pub data: Bytes,
}

impl Event {
    /// Whether the payload starts with the `[DONE]` sentinel.
    pub fn is_done(&self) -> bool {
        self.data.starts_with(DONE_SENTINEL)
    }
}

/// Pull-based decoder over a blocking byte source.
///
/// ```
/// use llm_stream_relay::stream::FrameDecoder;
///
/// let body = "event: ping\ndata: {}\n\n";
/// let mut decoder = FrameDecoder::new(body.as_bytes());
/// while decoder.advance() {
///     assert_eq!(decoder.event().event_type, "ping");
/// }
/// assert!(decoder.err().is_none());
/// ```
#[derive(Debug)]
pub struct FrameDecoder<R> {
    reader: Option<BufReader<R>>,
    event: Event,
    err: Option<StreamError>,
    max_line_bytes: usize,
    line: Vec<u8>,
}

impl<R: Read> FrameDecoder<R> {
    /// Create a decoder with the default line limit.
    pub fn new(reader: R) -> Self {
        Self::with_max_line_bytes(reader, DEFAULT_MAX_LINE_BYTES)
    }

    /// Create a decoder that fails on any line longer than `max_line_bytes`.
    pub fn with_max_line_bytes(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            event: Event::default(),
            err: None,
            max_line_bytes,
            line: Vec::new(),
        }
    }

    /// Advance to the next complete record.
    ///
    /// Returns `false` at end of input or on error; check [`err`](Self::err)
    /// to tell the two apart. Once an error is recorded every later call
    /// returns `false`.
    pub fn advance(&mut self) -> bool {
        if self.err.is_some() {
            return false;
        }

        let mut event_type = String::new();
        let mut data = BytesMut::new();

        loop {
            match self.read_line() {
                Ok(true) => {}
                Ok(false) => return false,
                Err(err) => {
                    tracing::debug!(error = %err, "SSE frame decoder stopped");
                    self.err = Some(err);
                    return false;
                }
            }

            let line = self.line.as_slice();

            // Dispatch event on an empty line
            if line.is_empty() {
                self.event = Event {
                    event_type,
                    data: data.freeze(),
                };
                return true;
            }

            let (name, value) = split_field(line);
            match name {
                b"" => continue,
                // Lossy: invalid UTF-8 in a type name becomes U+FFFD.
                b"event" => event_type = String::from_utf8_lossy(value).into_owned(),
                b"data" => {
                    data.put_slice(value);
                    data.put_u8(b'\n');
                }
                _ => {}
            }
        }
    }

    /// The most recently dispatched record.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The terminal error, if any.
    pub fn err(&self) -> Option<&StreamError> {
        self.err.as_ref()
    }

    /// Release the underlying byte source. Idempotent.
    pub fn close(&mut self) {
        if self.reader.take().is_some() {
            tracing::trace!("SSE frame decoder closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    pub(crate) fn take_err(&mut self) -> Option<StreamError> {
        self.err.take()
    }

    /// Read one line into `self.line` without its terminator.
    ///
    /// Returns `Ok(false)` at end of input.
    fn read_line(&mut self) -> Result<bool, StreamError> {
        let reader = self.reader.as_mut().ok_or(StreamError::Closed)?;
        let limit = self.max_line_bytes;

        self.line.clear();
        let read = reader
            .by_ref()
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut self.line)?;

        if read == 0 {
            return Ok(false);
        }

        if self.line.last() == Some(&b'\n') {
            self.line.pop();
        } else if self.line.len() > limit {
            return Err(StreamError::LineTooLong { limit });
        }

        if self.line.last() == Some(&b'\r') {
            self.line.pop();
        }

        Ok(true)
    }
}

/// Split a line like `event: bar` into `("event", "bar")`.
///
/// A line without a colon is a field name with an empty value. One space
/// after the colon is consumed if present.
fn split_field(line: &[u8]) -> (&[u8], &[u8]) {
    match line.iter().position(|&b| b == b':') {
        Some(colon) => {
            let value = &line[colon + 1..];
            let value = value.strip_prefix(b" ").unwrap_or(value);
            (&line[..colon], value)
        }
        None => (line, &[]),
    }
}

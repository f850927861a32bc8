//! Splitter for `<think>...</think>` reasoning blocks in streamed text.
//!
//! Content arrives in arbitrary fragments, so a marker may be cut anywhere.
//! The splitter keeps a possible partial marker in a pending buffer and
//! resolves it once the next fragment arrives (or flushes it on
//! [`finalize`]). Markers never appear in the output; markers do not nest,
//! so a second `<think>` inside a reasoning block is ordinary text.

use serde::Serialize;

pub const OPEN_MARKER: &str = "<think>";
pub const CLOSE_MARKER: &str = "</think>";

/// Which side of a marker the scanner is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Outside,
    Inside,
}

impl Mode {
    fn marker(self) -> &'static str {
        match self {
            Mode::Outside => OPEN_MARKER,
            Mode::Inside => CLOSE_MARKER,
        }
    }

    fn kind(self) -> SegmentKind {
        match self {
            Mode::Outside => SegmentKind::Answer,
            Mode::Inside => SegmentKind::Reasoning,
        }
    }

    fn flip(self) -> Self {
        match self {
            Mode::Outside => Mode::Inside,
            Mode::Inside => Mode::Outside,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Reasoning,
    Answer,
}

/// A contiguous run of output text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub kind: SegmentKind,
    pub text: String,
}

impl Segment {
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Answer,
            text: text.into(),
        }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Reasoning,
            text: text.into(),
        }
    }
}

/// Splitter state threaded by the caller between fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitterState {
    mode: Mode,
    pending: String,
}

impl SplitterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Text held back as a possible partial marker.
    pub fn pending(&self) -> &str {
        &self.pending
    }
}

/// Split one fragment into segments, updating `state`.
///
/// Text that could still become a marker is withheld in the state and
/// prepended to the next fragment.
///
/// ```
/// use llm_stream_relay::stream::think::{split, finalize, Segment, SplitterState};
///
/// let mut state = SplitterState::new();
/// let mut out = split(&mut state, "a<thi");
/// out.extend(split(&mut state, "nk>b</think>c"));
/// out.extend(finalize(&mut state));
/// assert_eq!(
///     out,
///     vec![Segment::answer("a"), Segment::reasoning("b"), Segment::answer("c")]
/// );
/// ```
pub fn split(state: &mut SplitterState, fragment: &str) -> Vec<Segment> {
    let mut text = std::mem::take(&mut state.pending);
    text.push_str(fragment);

    let mut segments = Vec::new();
    let mut run = String::new();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let marker = state.mode.marker();

        if rest.starts_with(marker) {
            push_run(&mut segments, state.mode, &mut run);
            state.mode = state.mode.flip();
            pos += marker.len();
            continue;
        }

        if marker.starts_with(rest) {
            state.pending.push_str(rest);
            break;
        }

        // Markers start with '<', so everything before the next one is text.
        let step = match rest.strip_prefix('<') {
            Some(after) => 1 + after.find('<').unwrap_or(after.len()),
            None => rest.find('<').unwrap_or(rest.len()),
        };
        run.push_str(&rest[..step]);
        pos += step;
    }

    push_run(&mut segments, state.mode, &mut run);
    segments
}

/// Flush any pending text verbatim, tagged by the current mode.
pub fn finalize(state: &mut SplitterState) -> Option<Segment> {
    if state.pending.is_empty() {
        return None;
    }
    Some(Segment {
        kind: state.mode.kind(),
        text: std::mem::take(&mut state.pending),
    })
}

/// Run every fragment through a fresh splitter and finalize it.
pub fn split_all<'a, I>(fragments: I) -> Vec<Segment>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = SplitterState::new();
    let mut segments: Vec<Segment> = fragments
        .into_iter()
        .flat_map(|fragment| split(&mut state, fragment))
        .collect();
    segments.extend(finalize(&mut state));
    segments
}

/// Merge adjacent segments of the same kind.
pub fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut merged: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match merged.last_mut() {
            Some(last) if last.kind == segment.kind => last.text.push_str(&segment.text),
            _ => merged.push(segment),
        }
    }
    merged
}

fn push_run(segments: &mut Vec<Segment>, mode: Mode, run: &mut String) {
    if !run.is_empty() {
        segments.push(Segment {
            kind: mode.kind(),
            text: std::mem::take(run),
        });
    }
}

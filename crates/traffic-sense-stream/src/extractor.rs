//! Incremental marker-delimited segment extraction.
//!
//! The buffer is scanned from the session cursor for markers. A segment runs
//! from its marker to the first of: its own terminator (end of line for
//! `Action:`-style markers, a blank line for `Thought:`/`Observation:`, `>
//! Finished` for final answers) or the next marker. Final answers ignore
//! every marker except `> Finished`. A segment with no terminator yet stays
//! open and is re-examined on the next call, unless the caller says the end
//! of the buffer is a boundary.

use std::sync::LazyLock;

use regex::Regex;
use traffic_sense_core::event::StreamEvent;

use crate::StreamSettings;
use crate::session::StreamSession;

static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"> Entering new[^\n]*\n|> Finished|",
        r"Thought:|思考[：:]|",
        r"Action Input:|Action:|正在使用工具[：:]|",
        r"Observation:|工具执行结果[：:]|",
        r"Final Answer:|最终答案[：:]",
    ))
    .expect("valid marker pattern")
});

static ANSWER_PIECE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\S+").expect("valid answer piece pattern"));

const FINISHED: &str = "> Finished";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Thought,
    Action,
    Observation,
    FinalAnswer,
}

/// A closed segment with its content trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub content: String,
}

impl Segment {
    fn new(kind: SegmentKind, raw: &str) -> Self {
        Self {
            kind,
            content: raw.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scope {
    Line,
    Block,
    Answer,
}

/// Segment kind and scope for a matched marker; `None` for `> Finished`.
fn classify(marker: &str) -> Option<(SegmentKind, Scope)> {
    let classified = match marker {
        "Thought:" => (SegmentKind::Thought, Scope::Block),
        "Action:" | "Action Input:" => (SegmentKind::Action, Scope::Line),
        "Observation:" => (SegmentKind::Observation, Scope::Block),
        "Final Answer:" => (SegmentKind::FinalAnswer, Scope::Answer),
        FINISHED => return None,
        m if m.starts_with("> Entering") => (SegmentKind::Thought, Scope::Block),
        m if m.starts_with("思考") => (SegmentKind::Thought, Scope::Line),
        m if m.starts_with("正在使用工具") => (SegmentKind::Action, Scope::Line),
        m if m.starts_with("工具执行结果") => (SegmentKind::Observation, Scope::Line),
        _ => (SegmentKind::FinalAnswer, Scope::Answer),
    };
    Some(classified)
}

/// Where the body starting at `body` ends, if it is closed yet.
fn segment_end(buffer: &str, body: usize, scope: Scope) -> Option<usize> {
    let rest = &buffer[body..];
    let terminator = match scope {
        Scope::Answer => return rest.find(FINISHED).map(|i| body + i),
        Scope::Line => rest.find('\n'),
        Scope::Block => rest.find("\n\n"),
    };
    let next_marker = MARKERS.find_at(buffer, body).map(|m| m.start() - body);
    match (terminator, next_marker) {
        (Some(t), Some(m)) => Some(body + t.min(m)),
        (t, m) => t.or(m).map(|i| body + i),
    }
}

/// Closed segments in `buffer[cursor..]` in buffer order, plus the new cursor.
///
/// Pure: the same buffer, cursor and boundary flag always give the same result.
pub fn scan(buffer: &str, cursor: usize, at_boundary: bool) -> (Vec<Segment>, usize) {
    let mut segments = Vec::new();
    let mut pos = cursor;

    while let Some(marker) = MARKERS.find_at(buffer, pos) {
        let Some((kind, scope)) = classify(marker.as_str()) else {
            pos = marker.end();
            continue;
        };
        let body = marker.end();
        match segment_end(buffer, body, scope) {
            Some(end) => {
                segments.push(Segment::new(kind, &buffer[body..end]));
                pos = end;
            }
            // An empty open segment waits for its content even at a boundary.
            None if at_boundary && !buffer[body..].trim().is_empty() => {
                segments.push(Segment::new(kind, &buffer[body..]));
                return (segments, buffer.len());
            }
            None => return (segments, marker.start()),
        }
    }

    if at_boundary {
        pos = buffer.len();
    }
    (segments, pos)
}

/// Turns closed segments into events, applying thresholds and dedup.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    min_chars: usize,
    observation_cap: usize,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(&StreamSettings::default())
    }
}

impl PatternExtractor {
    pub fn new(settings: &StreamSettings) -> Self {
        Self {
            min_chars: settings.min_segment_chars,
            observation_cap: settings.observation_cap,
        }
    }

    pub fn observation_cap(&self) -> usize {
        self.observation_cap
    }

    /// Emit events for segments closed since the last call.
    ///
    /// A final answer is re-emitted word by word followed by `done`; nothing
    /// after it in the buffer is examined.
    pub fn extract(&self, session: &mut StreamSession, at_boundary: bool) -> Vec<StreamEvent> {
        let (segments, cursor) = scan(session.buffer(), session.cursor(), at_boundary);
        session.set_cursor(cursor);

        let mut events = Vec::new();
        for segment in segments {
            let content = segment.content.as_str();
            match segment.kind {
                SegmentKind::Thought => {
                    if content.chars().count() > self.min_chars && session.record_thought(content) {
                        events.push(StreamEvent::thought(content));
                    }
                }
                SegmentKind::Action => {
                    if !content.is_empty() && session.record_action(content) {
                        events.push(StreamEvent::action(format!("执行: {content}")));
                    }
                }
                SegmentKind::Observation => {
                    if content.chars().count() > self.min_chars
                        && session.record_observation(content)
                    {
                        events.push(StreamEvent::observation(truncate(
                            content,
                            self.observation_cap,
                        )));
                    }
                }
                SegmentKind::FinalAnswer => {
                    if content.is_empty() {
                        continue;
                    }
                    events.extend(split_answer(content));
                    events.push(StreamEvent::done());
                    let end = session.buffer().len();
                    session.set_cursor(end);
                    break;
                }
            }
        }
        events
    }
}

/// `response` for the first word, `token` for each following word with its
/// leading whitespace.
pub fn split_answer(text: &str) -> Vec<StreamEvent> {
    ANSWER_PIECE
        .find_iter(text.trim())
        .enumerate()
        .map(|(i, piece)| {
            if i == 0 {
                StreamEvent::response(piece.as_str())
            } else {
                StreamEvent::token(piece.as_str())
            }
        })
        .collect()
}

/// Cap `text` at `cap` characters, marking the cut with `...`.
pub fn truncate(text: &str, cap: usize) -> String {
    match text.char_indices().nth(cap) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

//! Reasoning / final-answer state machine for token feeds.

use std::sync::LazyLock;

use regex::Regex;

static FINAL_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Final Answer:|最终答案[：:]").expect("valid final answer pattern"));

/// Longest final-answer marker in bytes (`最终答案：`), rounded up.
const MARKER_WINDOW: usize = 16;

/// Text after the first final-answer marker (`Final Answer:` or `最终答案：`).
pub fn final_answer_text(text: &str) -> Option<&str> {
    FINAL_MARKER.find(text).map(|m| &text[m.end()..])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Reasoning,
    FinalAnswer,
}

/// Where a fragment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed<'a> {
    /// Still reasoning: append to the buffer and extract.
    Reasoning(&'a str),
    /// This fragment completed the final-answer marker. `reasoning` ends with
    /// the marker, `answer` is whatever followed it.
    Switched { reasoning: &'a str, answer: &'a str },
    /// Already answering: pass through.
    Answer(&'a str),
}

/// Watches cumulative turn text for the final-answer marker.
///
/// The switch is one-way; only [`ModeTracker::reset`] returns to
/// [`Mode::Reasoning`].
#[derive(Debug, Default)]
pub struct ModeTracker {
    mode: Mode,
    seen: String,
}

impl ModeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.mode = Mode::Reasoning;
        self.seen.clear();
    }

    pub fn route<'a>(&mut self, fragment: &'a str) -> Routed<'a> {
        if self.mode == Mode::FinalAnswer {
            return Routed::Answer(fragment);
        }

        let prev_len = self.seen.len();
        self.seen.push_str(fragment);

        // A marker may straddle the previous fragment, so search a short tail
        // of what was already seen.
        let mut start = prev_len.saturating_sub(MARKER_WINDOW);
        while !self.seen.is_char_boundary(start) {
            start -= 1;
        }

        match FINAL_MARKER.find_at(&self.seen, start) {
            Some(m) if m.end() > prev_len => {
                self.mode = Mode::FinalAnswer;
                let split = m.end() - prev_len;
                Routed::Switched {
                    reasoning: &fragment[..split],
                    answer: &fragment[split..],
                }
            }
            _ => Routed::Reasoning(fragment),
        }
    }
}

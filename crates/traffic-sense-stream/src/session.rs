//! Per-turn parse state.

use std::collections::HashSet;

use crate::mode::{Mode, ModeTracker, Routed};

/// Everything the adapter knows about the current turn's raw trace.
///
/// `cursor` is the byte offset past the last closed segment in `buffer`;
/// text before it is never examined again.
#[derive(Debug, Default)]
pub struct StreamSession {
    buffer: String,
    cursor: usize,
    tracker: ModeTracker,
    sent_thoughts: HashSet<String>,
    sent_actions: HashSet<String>,
    sent_observations: HashSet<String>,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all state from a previous turn.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
        self.tracker.reset();
        self.sent_thoughts.clear();
        self.sent_actions.clear();
        self.sent_observations.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(self.buffer.is_char_boundary(cursor));
        self.cursor = cursor;
    }

    pub fn push_reasoning(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn mode(&self) -> Mode {
        self.tracker.mode()
    }

    pub fn route<'a>(&mut self, fragment: &'a str) -> Routed<'a> {
        self.tracker.route(fragment)
    }

    /// Record a thought; false if it was already sent.
    pub fn record_thought(&mut self, content: &str) -> bool {
        insert_new(&mut self.sent_thoughts, content)
    }

    pub fn record_action(&mut self, content: &str) -> bool {
        insert_new(&mut self.sent_actions, content)
    }

    /// Record an untruncated observation; false if it was already sent.
    pub fn record_observation(&mut self, content: &str) -> bool {
        insert_new(&mut self.sent_observations, content)
    }
}

fn insert_new(set: &mut HashSet<String>, content: &str) -> bool {
    if set.contains(content) {
        return false;
    }
    set.insert(content.to_string())
}

//! Typed events streamed to clients during a turn.
//!
//! Every turn produces an ordered sequence of [`StreamEvent`]s terminated by
//! exactly one [`EventKind::Done`]. On the wire each event is a single JSON
//! object `{"type": ..., "content": ...}` per line.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Kind of a streamed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Thought,
    Action,
    Observation,
    Response,
    Token,
    ThoughtStart,
    ActionStart,
    ResponseComplete,
    Error,
    Done,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Thought,
        EventKind::Action,
        EventKind::Observation,
        EventKind::Response,
        EventKind::Token,
        EventKind::ThoughtStart,
        EventKind::ActionStart,
        EventKind::ResponseComplete,
        EventKind::Error,
        EventKind::Done,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Thought => "thought",
            EventKind::Action => "action",
            EventKind::Observation => "observation",
            EventKind::Response => "response",
            EventKind::Token => "token",
            EventKind::ThoughtStart => "thought_start",
            EventKind::ActionStart => "action_start",
            EventKind::ResponseComplete => "response_complete",
            EventKind::Error => "error",
            EventKind::Done => "done",
        }
    }

    /// Parse a wire `type`, treating anything unknown as a generic [`EventKind::Token`].
    pub fn from_wire(value: &str) -> Self {
        value.parse().unwrap_or(EventKind::Token)
    }

    /// Whether this kind carries final-answer text.
    pub fn is_answer(self) -> bool {
        matches!(
            self,
            EventKind::Response | EventKind::Token | EventKind::ResponseComplete
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EventKind::from_wire(&raw))
    }
}

/// A single immutable event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub content: String,
}

impl StreamEvent {
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self::new(EventKind::Thought, content)
    }

    pub fn action(content: impl Into<String>) -> Self {
        Self::new(EventKind::Action, content)
    }

    pub fn observation(content: impl Into<String>) -> Self {
        Self::new(EventKind::Observation, content)
    }

    pub fn response(content: impl Into<String>) -> Self {
        Self::new(EventKind::Response, content)
    }

    pub fn token(content: impl Into<String>) -> Self {
        Self::new(EventKind::Token, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(EventKind::Error, content)
    }

    /// The terminal event of every turn.
    pub fn done() -> Self {
        Self::new(EventKind::Done, "")
    }

    pub fn is_done(&self) -> bool {
        self.kind == EventKind::Done
    }

    /// Serialize as one newline-terminated JSON line.
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            // Unreachable for a string-only record.
            format!(r#"{{"type":"{}","content":""}}"#, self.kind)
        });
        line.push('\n');
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = StreamEvent::thought("check status");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "thought");
        assert_eq!(json["content"], "check status");
    }

    #[test]
    fn test_done_line() {
        assert_eq!(StreamEvent::done().to_line(), "{\"type\":\"done\",\"content\":\"\"}\n");
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let line = StreamEvent::action("正在使用工具: lookup").to_line();
        assert!(line.contains("正在使用工具"));
    }

    #[test]
    fn test_unknown_type_becomes_token() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"thought_token","content":"x"}"#).unwrap();
        assert_eq!(event.kind, EventKind::Token);
        assert_eq!(event.content, "x");
    }

    #[test]
    fn test_every_kind_parses_back() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("nope".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_unknown_kind_error_message() {
        let err = "bogus".parse::<EventKind>().unwrap_err();
        assert_eq!(err, UnknownEventKind("bogus".into()));
        assert_eq!(err.to_string(), "unknown event kind: bogus");
    }

    #[test]
    fn test_missing_content_defaults_empty() {
        let event: StreamEvent = serde_json::from_str(r#"{"type":"done"}"#).unwrap();
        assert!(event.is_done());
        assert!(event.content.is_empty());
    }
}

//! Incremental trace-to-event streaming.
//!
//! An agent engine reports its turn through [`TraceObserver`] notifications.
//! The [`ProducerAdapter`] turns those into ordered [`StreamEvent`]s using the
//! [`PatternExtractor`] and [`ModeTracker`], and pushes them through a
//! turn-scoped bridge ([`bridge::channel`]) to an async consumer
//! ([`bridge::relay`]). Every turn ends with exactly one `done` event.

use std::time::Duration;

use traffic_sense_core::config::{FeedKind, StreamConfig};

pub mod adapter;
pub mod bridge;
pub mod extractor;
pub mod mode;
pub mod observer;
pub mod session;

pub use adapter::ProducerAdapter;
pub use bridge::{EventReceiver, EventSender, EventStream, Pulled};
pub use extractor::PatternExtractor;
pub use mode::{Mode, ModeTracker, Routed, final_answer_text};
pub use observer::{ErrorStage, Tee, TraceObserver};
pub use session::StreamSession;
pub use traffic_sense_core::event::{EventKind, StreamEvent};

/// Which raw feed supplies the reasoning buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// One fragment per streamed token; the final answer is passed through as it arrives.
    Tokens,
    /// Whole text chunks; the final answer is re-emitted word by word once complete.
    Captured,
}

impl From<FeedKind> for Feed {
    fn from(kind: FeedKind) -> Self {
        match kind {
            FeedKind::Tokens => Feed::Tokens,
            FeedKind::Captured => Feed::Captured,
        }
    }
}

impl std::fmt::Display for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feed::Tokens => f.write_str("tokens"),
            Feed::Captured => f.write_str("captured"),
        }
    }
}

/// Tuning knobs for one turn's stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub poll_interval: Duration,
    pub observation_cap: usize,
    pub min_segment_chars: usize,
    pub lifecycle_events: bool,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

impl From<&StreamConfig> for StreamSettings {
    fn from(config: &StreamConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            observation_cap: config.observation_cap,
            min_segment_chars: config.min_segment_chars,
            lifecycle_events: config.lifecycle_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_follow_config_defaults() {
        let settings = StreamSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(20));
        assert_eq!(settings.observation_cap, 200);
        assert_eq!(settings.min_segment_chars, 5);
        assert!(!settings.lifecycle_events);
    }

    #[test]
    fn test_feed_from_config_kind() {
        assert_eq!(Feed::from(FeedKind::Tokens), Feed::Tokens);
        assert_eq!(Feed::from(FeedKind::Captured), Feed::Captured);
        assert_eq!(Feed::Captured.to_string(), "captured");
    }
}

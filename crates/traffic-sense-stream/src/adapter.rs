//! Maps engine notifications onto the event stream.

use tracing::{debug, info, warn};
use traffic_sense_core::event::{EventKind, StreamEvent};
use uuid::Uuid;

use crate::bridge::EventSender;
use crate::extractor::{PatternExtractor, truncate};
use crate::mode::Routed;
use crate::observer::{ErrorStage, TraceObserver};
use crate::session::StreamSession;
use crate::{Feed, StreamSettings};

/// Owns one turn's [`StreamSession`] and pushes typed events to the bridge.
///
/// Guarantees a single trailing `done`: once it is pushed every further
/// event is dropped.
pub struct ProducerAdapter {
    turn_id: Uuid,
    session: StreamSession,
    extractor: PatternExtractor,
    sender: EventSender,
    feed: Feed,
    lifecycle_events: bool,
    answer_emitted: bool,
    finished: bool,
}

impl ProducerAdapter {
    pub fn new(sender: EventSender, feed: Feed, settings: &StreamSettings) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            session: StreamSession::new(),
            extractor: PatternExtractor::new(settings),
            sender,
            feed,
            lifecycle_events: settings.lifecycle_events,
            answer_emitted: false,
            finished: false,
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Whether `done` has been pushed for this turn.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn emit(&mut self, event: StreamEvent) {
        if self.finished {
            warn!(turn_id = %self.turn_id, kind = %event.kind, "Dropping event after done");
            return;
        }
        if event.kind.is_answer() {
            self.answer_emitted = true;
        }
        if event.is_done() {
            self.finished = true;
        }
        self.sender.push(event);
    }

    fn extract(&mut self, at_boundary: bool) {
        let events = self.extractor.extract(&mut self.session, at_boundary);
        for event in events {
            self.emit(event);
        }
    }

    /// Close whatever segment is still open.
    fn flush(&mut self) {
        if !self.finished {
            self.extract(true);
        }
    }

    fn stream_answer(&mut self, chunk: &str) {
        if chunk.trim().is_empty() {
            return;
        }
        let text = if self.answer_emitted {
            chunk
        } else {
            chunk.trim_start()
        };
        self.emit(StreamEvent::token(text));
    }
}

impl TraceObserver for ProducerAdapter {
    fn on_start(&mut self) {
        info!(turn_id = %self.turn_id, feed = %self.feed, "Turn started");
        self.session.reset();
        self.answer_emitted = false;
        self.finished = false;
        if self.lifecycle_events {
            self.emit(StreamEvent::new(EventKind::ThoughtStart, "开始思考..."));
        }
    }

    fn on_fragment(&mut self, text: &str) {
        if self.finished {
            return;
        }
        match self.feed {
            Feed::Captured => {
                self.session.push_reasoning(text);
                self.extract(true);
            }
            Feed::Tokens => match self.session.route(text) {
                Routed::Reasoning(reasoning) => {
                    self.session.push_reasoning(reasoning);
                    self.extract(false);
                }
                Routed::Switched { reasoning, answer } => {
                    debug!(turn_id = %self.turn_id, "Final answer marker seen, passing tokens through");
                    self.session.push_reasoning(reasoning);
                    self.extract(false);
                    self.stream_answer(answer);
                }
                Routed::Answer(answer) => self.stream_answer(answer),
            },
        }
    }

    fn on_llm_end(&mut self) {
        self.flush();
    }

    fn on_tool_start(&mut self, name: &str, input: Option<&str>) {
        self.flush();
        let content = match input.map(str::trim).filter(|i| !i.is_empty()) {
            Some(input) => format!("正在使用工具: {name} - {input}"),
            None => format!("正在使用工具: {name}"),
        };
        if !self.session.record_action(&content) {
            debug!(turn_id = %self.turn_id, tool = name, "Repeated tool call dropped");
            return;
        }
        if self.lifecycle_events {
            self.emit(StreamEvent::new(
                EventKind::ActionStart,
                format!("调用工具: {name}"),
            ));
        }
        self.emit(StreamEvent::action(content));
    }

    /// Empty output yields an empty observation.
    fn on_tool_end(&mut self, output: &str) {
        let output = output.trim();
        if !self.session.record_observation(output) {
            return;
        }
        let display = truncate(output, self.extractor.observation_cap());
        self.emit(StreamEvent::observation(display));
    }

    fn on_end(&mut self, output: &str) {
        self.flush();
        if self.finished {
            return;
        }
        if !self.answer_emitted {
            if !output.trim().is_empty() {
                self.emit(StreamEvent::response(output));
            }
        } else if self.lifecycle_events {
            self.emit(StreamEvent::new(EventKind::ResponseComplete, output));
        }
        self.emit(StreamEvent::done());
        info!(turn_id = %self.turn_id, "Turn finished");
    }

    fn on_error(&mut self, stage: ErrorStage, message: &str) {
        self.flush();
        warn!(turn_id = %self.turn_id, %stage, error = %message, "Turn failed");
        self.emit(StreamEvent::error(format!("{stage}: {message}")));
        self.emit(StreamEvent::done());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{self, EventReceiver, Pulled};

    fn adapter(feed: Feed) -> (ProducerAdapter, EventReceiver) {
        adapter_with(feed, StreamSettings::default())
    }

    fn adapter_with(feed: Feed, settings: StreamSettings) -> (ProducerAdapter, EventReceiver) {
        let (tx, rx) = bridge::channel();
        (ProducerAdapter::new(tx, feed, &settings), rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Pulled::Event(event) = rx.try_pull() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_token_feed_streams_answer_tokens() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        let tokens = [
            "Thought:", " I", " know", " it", "\n", "Final", " Answer", ":", " it", " is", " ",
            " congested",
        ];
        for token in tokens {
            adapter.on_fragment(token);
        }
        adapter.on_llm_end();
        adapter.on_end("it is congested");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::thought("I know it"),
                StreamEvent::token("it"),
                StreamEvent::token(" is"),
                StreamEvent::token(" congested"),
                StreamEvent::done(),
            ]
        );
    }

    #[test]
    fn test_token_feed_answer_markers_not_reparsed() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_fragment("Final Answer: use the");
        adapter.on_fragment("\nAction: detour\nObservation: quieter roads\n");
        adapter.on_end("use the detour");

        let events = drain(&mut rx);
        assert!(
            events
                .iter()
                .all(|e| matches!(e.kind, EventKind::Token | EventKind::Done)),
            "got {events:?}"
        );
        assert_eq!(events.first(), Some(&StreamEvent::token("use the")));
    }

    #[test]
    fn test_fallback_response_when_nothing_streamed() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_fragment("Thought: checking the junction\n");
        adapter.on_end("Agent stopped due to iteration limit or time limit.");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::thought("checking the junction"),
                StreamEvent::response("Agent stopped due to iteration limit or time limit."),
                StreamEvent::done(),
            ]
        );
    }

    #[test]
    fn test_tool_action_carries_input() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_fragment("Action: demo_longhua_simulation\nAction Input: Longhua");
        adapter.on_llm_end();
        adapter.on_tool_start("demo_longhua_simulation", Some("Longhua"));
        adapter.on_tool_end("");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::action("执行: demo_longhua_simulation"),
                StreamEvent::action("执行: Longhua"),
                StreamEvent::action("正在使用工具: demo_longhua_simulation - Longhua"),
                StreamEvent::observation(""),
            ]
        );
    }

    #[test]
    fn test_repeated_tool_call_sent_once() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_tool_start("demo_longhua_simulation", None);
        adapter.on_tool_end("Longhua is congested");
        adapter.on_tool_start("demo_longhua_simulation", None);
        adapter.on_tool_end("Longhua is congested");
        adapter.on_tool_start("demo_longhua_result", None);
        adapter.on_tool_end("  ");
        adapter.on_end("x");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::action("正在使用工具: demo_longhua_simulation"),
                StreamEvent::observation("Longhua is congested"),
                StreamEvent::action("正在使用工具: demo_longhua_result"),
                StreamEvent::observation(""),
                StreamEvent::response("x"),
                StreamEvent::done(),
            ]
        );
    }

    #[test]
    fn test_tool_observation_dedups_captured_echo() {
        let (mut adapter, mut rx) = adapter(Feed::Captured);
        adapter.on_start();
        adapter.on_tool_start("lookup", None);
        adapter.on_tool_end("heavy congestion");
        adapter.on_fragment("Observation: heavy congestion\n");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::action("正在使用工具: lookup"),
                StreamEvent::observation("heavy congestion"),
            ]
        );
    }

    #[test]
    fn test_error_flushes_pending_thought() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_fragment("Thought: checking the junction");
        adapter.on_error(ErrorStage::Llm, "rate limited");

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::thought("checking the junction"),
                StreamEvent::error("LLM Error: rate limited"),
                StreamEvent::done(),
            ]
        );
    }

    #[test]
    fn test_nothing_after_done() {
        let (mut adapter, mut rx) = adapter(Feed::Captured);
        adapter.on_start();
        adapter.on_fragment("Final Answer: clear roads");
        assert!(adapter.is_finished());
        adapter.on_tool_end("late output");
        adapter.on_end("clear roads");
        adapter.on_error(ErrorStage::Chain, "late failure");

        let events = drain(&mut rx);
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
        assert_eq!(events.last(), Some(&StreamEvent::done()));
    }

    #[test]
    fn test_lifecycle_events() {
        let settings = StreamSettings {
            lifecycle_events: true,
            ..StreamSettings::default()
        };
        let (mut adapter, mut rx) = adapter_with(Feed::Tokens, settings);
        adapter.on_start();
        adapter.on_tool_start("lookup", None);
        adapter.on_fragment("Final Answer: open");
        adapter.on_end("open");

        let kinds: Vec<EventKind> = drain(&mut rx).into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::ThoughtStart,
                EventKind::ActionStart,
                EventKind::Action,
                EventKind::Token,
                EventKind::ResponseComplete,
                EventKind::Done,
            ]
        );
    }

    #[test]
    fn test_start_resets_previous_turn() {
        let (mut adapter, mut rx) = adapter(Feed::Tokens);
        adapter.on_start();
        adapter.on_fragment("Thought: checking the junction\n\n");
        adapter.on_end("");
        adapter.on_start();
        adapter.on_fragment("Thought: checking the junction\n\n");
        adapter.on_end("");

        let thoughts = drain(&mut rx)
            .into_iter()
            .filter(|e| e.kind == EventKind::Thought)
            .count();
        assert_eq!(thoughts, 2);
    }
}

//! End-to-end turns: notifications in on a blocking thread, events out of the relay.

use std::time::Duration;

use futures::StreamExt;
use traffic_sense_stream::{
    ErrorStage, EventKind, Feed, ProducerAdapter, StreamEvent, StreamSettings, TraceObserver,
    bridge,
};

const POLL: Duration = Duration::from_millis(5);

async fn run_turn<F>(feed: Feed, script: F) -> Vec<StreamEvent>
where
    F: FnOnce(&mut ProducerAdapter) + Send + 'static,
{
    let (tx, rx) = bridge::channel();
    let mut adapter = ProducerAdapter::new(tx, feed, &StreamSettings::default());
    let producer = tokio::task::spawn_blocking(move || script(&mut adapter));
    bridge::relay(rx, producer, POLL).collect().await
}

fn assert_single_trailing_done(events: &[StreamEvent]) {
    assert_eq!(
        events.iter().filter(|e| e.is_done()).count(),
        1,
        "expected exactly one done in {events:?}"
    );
    assert_eq!(events.last(), Some(&StreamEvent::done()));
}

#[tokio::test]
async fn test_captured_turn_with_tool_and_answer() {
    let events = run_turn(Feed::Captured, |adapter| {
        adapter.on_start();
        adapter.on_fragment("Thought: check status\n");
        adapter.on_fragment("Action: lookup\n");
        adapter.on_tool_start("lookup", None);
        adapter.on_tool_end("congested");
        adapter.on_fragment("Final Answer: it is congested");
        adapter.on_end("it is congested");
    })
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::thought("check status"),
            StreamEvent::action("执行: lookup"),
            StreamEvent::action("正在使用工具: lookup"),
            StreamEvent::observation("congested"),
            StreamEvent::response("it"),
            StreamEvent::token(" is"),
            StreamEvent::token(" congested"),
            StreamEvent::done(),
        ]
    );
}

#[tokio::test]
async fn test_engine_error_after_one_thought() {
    let events = run_turn(Feed::Tokens, |adapter| {
        adapter.on_start();
        for token in ["Thought:", " check", " the", " junction", " status", "\n"] {
            adapter.on_fragment(token);
        }
        adapter.on_error(ErrorStage::Llm, "request timed out");
    })
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::thought("check the junction status"),
            StreamEvent::error("LLM Error: request timed out"),
            StreamEvent::done(),
        ]
    );
    assert!(!events.iter().any(|e| e.kind == EventKind::Response));
}

#[tokio::test]
async fn test_tool_error_terminates_stream() {
    let events = run_turn(Feed::Tokens, |adapter| {
        adapter.on_start();
        adapter.on_fragment("Action: demo_longhua_result\n");
        adapter.on_tool_start("demo_longhua_result", Some(""));
        adapter.on_error(ErrorStage::Tool, "demo_longhua_result: sensor feed offline");
    })
    .await;

    assert_eq!(
        events[events.len() - 2],
        StreamEvent::error("Tool Error: demo_longhua_result: sensor feed offline")
    );
    assert_single_trailing_done(&events);
}

#[tokio::test]
async fn test_silent_producer_still_terminates() {
    let events = run_turn(Feed::Tokens, |adapter| {
        adapter.on_start();
        adapter.on_fragment("Thought: the engine will stop without a result\n\n");
    })
    .await;

    assert_eq!(
        events,
        vec![
            StreamEvent::thought("the engine will stop without a result"),
            StreamEvent::done(),
        ]
    );
}

#[tokio::test]
async fn test_panicking_producer_still_terminates() {
    let events = run_turn(Feed::Tokens, |adapter| {
        adapter.on_start();
        panic!("engine crashed");
    })
    .await;

    assert_eq!(events, vec![StreamEvent::done()]);
}

#[tokio::test]
async fn test_token_turn_orders_segments_by_text() {
    let trace = "Thought: congestion reported on Longhua road\n\
        Action: demo_longhua_simulation\n\
        Action Input: Longhua road\n";
    let events = run_turn(Feed::Tokens, move |adapter| {
        adapter.on_start();
        adapter.on_fragment("Thought: ");
        for word in trace["Thought: ".len()..].split_inclusive(' ') {
            adapter.on_fragment(word);
        }
        adapter.on_llm_end();
        adapter.on_tool_start("demo_longhua_simulation", Some("Longhua road"));
        adapter.on_tool_end("Average speed 12 km/h, queue length 1.4 km");
        adapter.on_fragment("Thought: ");
        for word in ["I", " now", " know", "\nFinal", " Answer:", " reroute", " via", " Meilong"] {
            adapter.on_fragment(word);
        }
        adapter.on_llm_end();
        adapter.on_end("reroute via Meilong");
    })
    .await;

    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Thought,
            EventKind::Action,
            EventKind::Action,
            EventKind::Action,
            EventKind::Observation,
            EventKind::Thought,
            EventKind::Token,
            EventKind::Token,
            EventKind::Token,
            EventKind::Done,
        ]
    );
    let answer: String = events
        .iter()
        .filter(|e| e.kind == EventKind::Token)
        .map(|e| e.content.as_str())
        .collect();
    assert_eq!(answer, "reroute via Meilong");
}

#[tokio::test]
async fn test_long_tool_output_truncated() {
    let output = "拥堵".repeat(150);
    let events = run_turn(Feed::Tokens, move |adapter| {
        adapter.on_start();
        adapter.on_tool_start("demo_longhua_simulation", None);
        adapter.on_tool_end(&output);
        adapter.on_tool_end(&output);
        adapter.on_end("done");
    })
    .await;

    let observations: Vec<&StreamEvent> = events
        .iter()
        .filter(|e| e.kind == EventKind::Observation)
        .collect();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].content.chars().count(), 203);
    assert_single_trailing_done(&events);
}

#[tokio::test]
async fn test_dropped_consumer_lets_producer_finish() {
    let (tx, rx) = bridge::channel();
    let mut adapter = ProducerAdapter::new(tx, Feed::Tokens, &StreamSettings::default());
    let (finished_tx, finished_rx) = tokio::sync::oneshot::channel();
    let producer = tokio::task::spawn_blocking(move || {
        adapter.on_start();
        adapter.on_tool_start("demo_longhua_simulation", None);
        std::thread::sleep(Duration::from_millis(30));
        adapter.on_tool_end("Average speed 12 km/h");
        adapter.on_end("reroute");
        let _ = finished_tx.send(adapter.is_finished());
    });

    let mut stream = bridge::relay(rx, producer, POLL);
    let first = stream.next().await;
    assert_eq!(first.map(|e| e.kind), Some(EventKind::Action));
    drop(stream);

    let finished = tokio::time::timeout(Duration::from_secs(5), finished_rx)
        .await
        .expect("producer should finish")
        .expect("producer should report");
    assert!(finished);
}

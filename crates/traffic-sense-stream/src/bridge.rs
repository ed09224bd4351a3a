//! Turn-scoped hand-off from a blocking producer to an async consumer.

use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use traffic_sense_core::event::StreamEvent;

/// Boxed stream of events handed to the transport.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Create the queue for one turn.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer side. Never blocks and is safe to call outside the runtime.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl EventSender {
    /// Queue an event. Returns false when the consumer is gone; the event is
    /// discarded and the producer carries on.
    pub fn push(&self, event: StreamEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(kind = %event.kind, "Consumer gone, discarding event");
                false
            }
        }
    }
}

/// Result of one consumer pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pulled {
    Event(StreamEvent),
    /// Nothing arrived in time.
    Empty,
    /// Every sender is gone and the queue is drained.
    Closed,
}

/// Consumer side.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
}

impl EventReceiver {
    /// Wait at most `timeout` for the next event.
    pub async fn pull(&mut self, timeout: Duration) -> Pulled {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(event)) => Pulled::Event(event),
            Ok(None) => Pulled::Closed,
            Err(_) => Pulled::Empty,
        }
    }

    /// Take an already-queued event without waiting.
    pub fn try_pull(&mut self) -> Pulled {
        match self.rx.try_recv() {
            Ok(event) => Pulled::Event(event),
            Err(mpsc::error::TryRecvError::Empty) => Pulled::Empty,
            Err(mpsc::error::TryRecvError::Disconnected) => Pulled::Closed,
        }
    }
}

struct RelayState {
    receiver: EventReceiver,
    producer: Option<JoinHandle<()>>,
    poll_interval: Duration,
    producer_done: bool,
    finished: bool,
}

impl RelayState {
    /// Reap a finished producer so a panic is logged rather than lost.
    async fn reap(&mut self) {
        self.producer_done = true;
        if let Some(handle) = self.producer.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Turn producer failed");
            }
        }
    }

    fn producer_finished(&self) -> bool {
        self.producer.as_ref().is_none_or(|h| h.is_finished())
    }
}

/// Relay queued events until `done`.
///
/// Pulls with `poll_interval`. When nothing arrives and the producer has
/// already finished, the queue is drained and a `done` is synthesized if the
/// producer never sent one. Events after `done` are never yielded. Dropping
/// the stream abandons the relay; the producer still runs to completion.
pub fn relay(
    receiver: EventReceiver,
    producer: JoinHandle<()>,
    poll_interval: Duration,
) -> EventStream {
    let state = RelayState {
        receiver,
        producer: Some(producer),
        poll_interval,
        producer_done: false,
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            let pulled = if state.producer_done {
                state.receiver.try_pull()
            } else {
                state.receiver.pull(state.poll_interval).await
            };

            match pulled {
                Pulled::Event(event) => {
                    state.finished = event.is_done();
                    return Some((event, state));
                }
                Pulled::Empty if !state.producer_done => {
                    if state.producer_finished() {
                        state.reap().await;
                    }
                }
                Pulled::Empty | Pulled::Closed => {
                    if !state.producer_done && state.producer_finished() {
                        state.reap().await;
                    }
                    warn!("Producer ended without done, closing the stream");
                    state.finished = true;
                    return Some((StreamEvent::done(), state));
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    const POLL: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_pull_times_out_when_empty() {
        let (_tx, mut rx) = channel();
        assert_eq!(rx.pull(POLL).await, Pulled::Empty);
    }

    #[tokio::test]
    async fn test_pull_closed_after_senders_drop() {
        let (tx, mut rx) = channel();
        tx.push(StreamEvent::thought("first thought"));
        drop(tx);
        assert_eq!(
            rx.pull(POLL).await,
            Pulled::Event(StreamEvent::thought("first thought"))
        );
        assert_eq!(rx.pull(POLL).await, Pulled::Closed);
    }

    #[tokio::test]
    async fn test_push_after_receiver_dropped_is_discarded() {
        let (tx, rx) = channel();
        drop(rx);
        assert!(!tx.push(StreamEvent::done()));
    }

    #[tokio::test]
    async fn test_relay_stops_at_done() {
        let (tx, rx) = channel();
        let producer = tokio::task::spawn_blocking(move || {
            tx.push(StreamEvent::thought("checking the map"));
            tx.push(StreamEvent::done());
            tx.push(StreamEvent::token("late"));
        });
        let events: Vec<StreamEvent> = relay(rx, producer, POLL).collect().await;
        assert_eq!(
            events,
            vec![StreamEvent::thought("checking the map"), StreamEvent::done()]
        );
    }

    #[tokio::test]
    async fn test_relay_synthesizes_done_for_silent_producer() {
        let (tx, rx) = channel();
        let keep_alive = tx.clone();
        let producer = tokio::task::spawn_blocking(move || {
            tx.push(StreamEvent::thought("checking the map"));
        });
        let events: Vec<StreamEvent> = relay(rx, producer, POLL).collect().await;
        assert_eq!(
            events,
            vec![StreamEvent::thought("checking the map"), StreamEvent::done()]
        );
        drop(keep_alive);
    }

    #[tokio::test]
    async fn test_relay_survives_producer_panic() {
        let (tx, rx) = channel();
        let producer = tokio::task::spawn_blocking(move || {
            tx.push(StreamEvent::thought("about to fail"));
            panic!("engine blew up");
        });
        let events: Vec<StreamEvent> = relay(rx, producer, POLL).collect().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_done());
    }
}

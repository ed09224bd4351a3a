//! The chat service: one engine, one conversation, streaming or not.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{Instrument, error, info, info_span};
use traffic_sense_core::config::{Config, EngineKind};
use traffic_sense_core::protocol::{ChatResponse, ChatStatus};
use traffic_sense_stream::bridge::{self, EventStream};
use traffic_sense_stream::{Feed, ProducerAdapter, StreamSettings, Tee};
use traffic_sense_tools::ToolRegistry;

use crate::engine::{AgentEngine, TurnInput, run_turn};
use crate::memory::{ConversationMemory, TraceRecorder};
use crate::react::{ReactEngine, ReactSettings};
use crate::scripted::ScriptedEngine;

/// Result of a non-streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub response: String,
    pub thoughts: Vec<String>,
    pub status: ChatStatus,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        ChatResponse {
            response: outcome.response,
            thoughts: outcome.thoughts,
            status: outcome.status,
            timestamp: Utc::now(),
        }
    }
}

/// Runs turns against a shared conversation memory.
///
/// Turns are serialized: a turn holds the memory lock from the moment its
/// history is read until its exchange is recorded, so the next turn always
/// sees the previous answer.
pub struct AgentService {
    engine: Arc<dyn AgentEngine>,
    memory: Arc<Mutex<ConversationMemory>>,
    settings: StreamSettings,
}

impl AgentService {
    pub fn new(engine: Arc<dyn AgentEngine>, settings: StreamSettings) -> Self {
        Self {
            engine,
            memory: Arc::new(Mutex::new(ConversationMemory::new())),
            settings,
        }
    }

    /// Build the engine named in the config.
    ///
    /// The ReAct engine needs a provider and fails here when none can be
    /// built; the scripted engine never does.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let settings = StreamSettings::from(&config.stream());
        let engine: Arc<dyn AgentEngine> = match config.engine() {
            EngineKind::React => {
                let provider = traffic_sense_providers::from_config(&config.models())?;
                let tools = Arc::new(ToolRegistry::with_builtins());
                Arc::new(ReactEngine::new(
                    provider,
                    tools,
                    ReactSettings::from_config(config),
                ))
            }
            EngineKind::Scripted => {
                let feed = config.feed_override().map(Feed::from).unwrap_or(Feed::Tokens);
                Arc::new(ScriptedEngine::traffic_demo(feed))
            }
        };
        info!(engine = ?config.engine(), feed = %engine.feed(), "Agent service ready");
        Ok(Self::new(engine, settings))
    }

    pub fn feed(&self) -> Feed {
        self.engine.feed()
    }

    /// Start a turn and return its event stream.
    ///
    /// The engine runs on a blocking thread; the stream always ends with a
    /// single `done`, even if the engine panics. Dropping the stream does not
    /// cancel the turn.
    pub async fn chat_stream(&self, message: &str) -> EventStream {
        let mut memory = Arc::clone(&self.memory).lock_owned().await;
        let input = TurnInput::new(message, memory.render_history());

        let (tx, rx) = bridge::channel();
        let adapter = ProducerAdapter::new(tx, self.engine.feed(), &self.settings);
        let span = info_span!("turn", turn_id = %adapter.turn_id());
        let engine = Arc::clone(&self.engine);

        let producer = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mut observer = Tee::new(adapter, TraceRecorder::new());
            let result = run_turn(engine.as_ref(), &input, &mut observer);
            let (adapter, recorder) = observer.into_parts();
            drop(adapter);
            if let Ok(answer) = result {
                memory.record(&input.message, &answer, recorder.into_entries());
            }
        });

        bridge::relay(rx, producer, self.settings.poll_interval)
    }

    /// Run a turn to completion and return the answer with its trace.
    pub async fn chat(&self, message: &str) -> ChatOutcome {
        let mut memory = Arc::clone(&self.memory).lock_owned().await;
        let input = TurnInput::new(message, memory.render_history());
        let engine = Arc::clone(&self.engine);

        let joined = tokio::task::spawn_blocking(move || {
            let mut recorder = TraceRecorder::new();
            let result = run_turn(engine.as_ref(), &input, &mut recorder);
            result.map(|answer| {
                let before = memory.trace().len();
                memory.record(&input.message, &answer, recorder.into_entries());
                (answer, memory.trace_since(before))
            })
        })
        .instrument(info_span!("chat"))
        .await;

        match joined {
            Ok(Ok((response, thoughts))) => ChatOutcome {
                response,
                thoughts,
                status: ChatStatus::Success,
            },
            Ok(Err(e)) => ChatOutcome {
                response: format!("Error processing request: {e}"),
                thoughts: Vec::new(),
                status: ChatStatus::Error,
            },
            Err(e) => {
                error!(error = %e, "Engine task failed");
                ChatOutcome {
                    response: format!("Error processing request: {e}"),
                    thoughts: Vec::new(),
                    status: ChatStatus::Error,
                }
            }
        }
    }

    /// Forget the conversation.
    pub async fn reset(&self) {
        self.memory.lock().await.clear();
        info!("Conversation memory cleared");
    }

    pub async fn exchange_count(&self) -> usize {
        self.memory.lock().await.exchanges().len()
    }

    /// Trace entries of every turn so far.
    pub async fn trace(&self) -> Vec<String> {
        self.memory.lock().await.trace().to_vec()
    }
}

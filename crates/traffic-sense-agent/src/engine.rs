//! The engine boundary and the turn runner.

use thiserror::Error;
use tracing::{error, info};
use traffic_sense_stream::{ErrorStage, Feed, TraceObserver};

/// Why a turn failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The LLM call failed or timed out.
    #[error("{0}")]
    Llm(String),

    /// The reasoning loop itself failed.
    #[error("{0}")]
    Chain(String),

    #[error("{tool}: {message}")]
    Tool { tool: String, message: String },
}

impl EngineError {
    pub fn stage(&self) -> ErrorStage {
        match self {
            EngineError::Llm(_) => ErrorStage::Llm,
            EngineError::Chain(_) => ErrorStage::Chain,
            EngineError::Tool { .. } => ErrorStage::Tool,
        }
    }
}

/// What an engine needs for one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub message: String,
    /// Rendered prior conversation, empty on the first turn.
    pub history: String,
}

impl TurnInput {
    pub fn new(message: impl Into<String>, history: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: history.into(),
        }
    }
}

/// A blocking reasoning engine.
///
/// `run` reports text fragments, LLM-call ends, and tool calls to the
/// observer as they happen and returns the final answer. It must not call
/// `on_start`, `on_end` or `on_error`; [`run_turn`] does.
pub trait AgentEngine: Send + Sync {
    /// How this engine delivers its text.
    fn feed(&self) -> Feed;

    fn run(
        &self,
        input: &TurnInput,
        observer: &mut dyn TraceObserver,
    ) -> Result<String, EngineError>;
}

/// Run one turn, bracketing it with start and end/error notifications.
pub fn run_turn(
    engine: &dyn AgentEngine,
    input: &TurnInput,
    observer: &mut dyn TraceObserver,
) -> Result<String, EngineError> {
    observer.on_start();
    match engine.run(input, &mut *observer) {
        Ok(output) => {
            observer.on_end(&output);
            info!(output_len = output.len(), "Engine finished");
            Ok(output)
        }
        Err(e) => {
            error!(stage = %e.stage(), error = %e, "Engine failed");
            observer.on_error(e.stage(), &e.to_string());
            Err(e)
        }
    }
}

//! Agent engines and the chat service built on them.
//!
//! An [`AgentEngine`] runs one turn and reports its trace to a
//! [`TraceObserver`](traffic_sense_stream::TraceObserver). The
//! [`AgentService`] wires an engine to the stream layer, keeps conversation
//! memory, and exposes streaming, non-streaming, and reset operations.

pub mod engine;
pub mod memory;
pub mod prompt;
pub mod react;
pub mod scripted;
pub mod service;

pub use engine::{AgentEngine, EngineError, TurnInput, run_turn};
pub use memory::{ConversationMemory, TraceRecorder};
pub use react::{ReactEngine, ReactSettings};
pub use scripted::{ScriptStep, ScriptedEngine};
pub use service::{AgentService, ChatOutcome};

//! Conversation memory and the trace recorder that feeds it.

use traffic_sense_stream::{ErrorStage, TraceObserver};

/// One human message and the agent's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub human: String,
    pub ai: String,
}

/// Everything kept across turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    exchanges: Vec<Exchange>,
    trace: Vec<String>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a finished turn and its reasoning-trace entries.
    pub fn record(&mut self, human: &str, ai: &str, trace: Vec<String>) {
        self.exchanges.push(Exchange {
            human: human.to_string(),
            ai: ai.to_string(),
        });
        self.trace.extend(trace);
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    /// Trace entries recorded at or after `index`.
    pub fn trace_since(&self, index: usize) -> Vec<String> {
        self.trace.get(index..).map(<[String]>::to_vec).unwrap_or_default()
    }

    /// `Human:`/`AI:` transcript for the prompt.
    pub fn render_history(&self) -> String {
        self.exchanges
            .iter()
            .map(|e| format!("Human: {}\nAI: {}\n", e.human, e.ai))
            .collect()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.trace.clear();
    }
}

/// Collects one trace entry per reasoning step.
///
/// Each LLM call's text becomes an entry when the call ends; each tool
/// output becomes an `Observation: …` entry.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    current: String,
    entries: Vec<String>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_entries(mut self) -> Vec<String> {
        self.close_step();
        self.entries
    }

    fn close_step(&mut self) {
        let step = self.current.trim();
        if !step.is_empty() {
            self.entries.push(step.to_string());
        }
        self.current.clear();
    }
}

impl TraceObserver for TraceRecorder {
    fn on_start(&mut self) {
        self.current.clear();
        self.entries.clear();
    }

    fn on_fragment(&mut self, text: &str) {
        self.current.push_str(text);
    }

    fn on_llm_end(&mut self) {
        self.close_step();
    }

    fn on_tool_start(&mut self, _name: &str, _input: Option<&str>) {
        self.close_step();
    }

    fn on_tool_end(&mut self, output: &str) {
        self.entries.push(format!("Observation: {}", output.trim()));
    }

    fn on_end(&mut self, _output: &str) {
        self.close_step();
    }

    fn on_error(&mut self, _stage: ErrorStage, _message: &str) {
        self.close_step();
    }
}

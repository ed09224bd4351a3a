//! Inbound boundary: lifecycle notifications from an agent engine.

use std::fmt;

/// Stage at which a turn failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    Llm,
    Chain,
    Tool,
}

impl ErrorStage {
    pub fn label(self) -> &'static str {
        match self {
            ErrorStage::Llm => "LLM Error",
            ErrorStage::Chain => "Chain Error",
            ErrorStage::Tool => "Tool Error",
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives an engine's trace as it happens.
///
/// Engines call `on_fragment`, `on_llm_end`, `on_tool_start` and
/// `on_tool_end` while they run. The turn runner owns `on_start`, `on_end`
/// and `on_error`. All methods default to no-ops so an observer only
/// implements what it cares about.
pub trait TraceObserver: Send {
    fn on_start(&mut self) {}

    /// A new piece of raw text (a streamed token or a captured chunk).
    fn on_fragment(&mut self, _text: &str) {}

    /// One LLM call finished.
    fn on_llm_end(&mut self) {}

    fn on_tool_start(&mut self, _name: &str, _input: Option<&str>) {}

    fn on_tool_end(&mut self, _output: &str) {}

    /// The turn finished with its final output.
    fn on_end(&mut self, _output: &str) {}

    fn on_error(&mut self, _stage: ErrorStage, _message: &str) {}
}

/// Forwards every notification to two observers, first then second.
pub struct Tee<A, B> {
    pub first: A,
    pub second: B,
}

impl<A, B> Tee<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_parts(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: TraceObserver, B: TraceObserver> TraceObserver for Tee<A, B> {
    fn on_start(&mut self) {
        self.first.on_start();
        self.second.on_start();
    }

    fn on_fragment(&mut self, text: &str) {
        self.first.on_fragment(text);
        self.second.on_fragment(text);
    }

    fn on_llm_end(&mut self) {
        self.first.on_llm_end();
        self.second.on_llm_end();
    }

    fn on_tool_start(&mut self, name: &str, input: Option<&str>) {
        self.first.on_tool_start(name, input);
        self.second.on_tool_start(name, input);
    }

    fn on_tool_end(&mut self, output: &str) {
        self.first.on_tool_end(output);
        self.second.on_tool_end(output);
    }

    fn on_end(&mut self, output: &str) {
        self.first.on_end(output);
        self.second.on_end(output);
    }

    fn on_error(&mut self, stage: ErrorStage, message: &str) {
        self.first.on_error(stage, message);
        self.second.on_error(stage, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log(Vec<String>);

    impl TraceObserver for Log {
        fn on_fragment(&mut self, text: &str) {
            self.0.push(format!("fragment:{text}"));
        }

        fn on_tool_start(&mut self, name: &str, input: Option<&str>) {
            self.0.push(format!("tool:{name}:{}", input.unwrap_or("-")));
        }

        fn on_error(&mut self, stage: ErrorStage, message: &str) {
            self.0.push(format!("{stage}: {message}"));
        }
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(ErrorStage::Llm.to_string(), "LLM Error");
        assert_eq!(ErrorStage::Chain.to_string(), "Chain Error");
        assert_eq!(ErrorStage::Tool.to_string(), "Tool Error");
    }

    #[test]
    fn test_tee_forwards_to_both() {
        let mut tee = Tee::new(Log::default(), Log::default());
        tee.on_fragment("Thought:");
        tee.on_tool_start("lookup", None);
        tee.on_llm_end();
        tee.on_error(ErrorStage::Tool, "boom");

        let (first, second) = tee.into_parts();
        let expected = vec![
            "fragment:Thought:".to_string(),
            "tool:lookup:-".to_string(),
            "Tool Error: boom".to_string(),
        ];
        assert_eq!(first.0, expected);
        assert_eq!(second.0, expected);
    }
}

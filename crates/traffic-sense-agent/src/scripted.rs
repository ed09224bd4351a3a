//! A deterministic engine that replays a fixed trace.
//!
//! Used for the offline demo and for driving the stream layer in tests
//! without an LLM.

use traffic_sense_stream::{Feed, TraceObserver};
use traffic_sense_tools::traffic::{SIMULATION_REPORT, SIMULATION_TOOL};

use crate::engine::{AgentEngine, EngineError, TurnInput};

const DEMO_ANSWER: &str = "Traffic around Shenzhen North Station in Longhua District is heavily \
congested because of the summer return peak. Run the signal optimization for the station area \
and check the simulation result afterwards.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Fragment(String),
    LlmEnd,
    Tool {
        name: String,
        input: Option<String>,
        output: String,
    },
    ToolFailure {
        name: String,
        message: String,
    },
    Fail(EngineError),
    Panic(String),
}

#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    feed: Feed,
    steps: Vec<ScriptStep>,
    output: String,
}

impl ScriptedEngine {
    pub fn new(feed: Feed) -> Self {
        Self {
            feed,
            steps: Vec::new(),
            output: String::new(),
        }
    }

    /// The canned Longhua congestion turn: one simulation call, then an answer.
    ///
    /// With [`Feed::Tokens`] each generation is replayed word by word; with
    /// [`Feed::Captured`] each generation arrives as one fragment.
    pub fn traffic_demo(feed: Feed) -> Self {
        let first = format!(
            "Thought: The user wants the current traffic conditions in Longhua District, \
             so I should run the simulation first.\nAction: {SIMULATION_TOOL}\n\
             Action Input: Longhua District\n"
        );
        let second = format!("Thought: I now know the final answer.\nFinal Answer: {DEMO_ANSWER}");

        Self::new(feed)
            .generation(&first)
            .llm_end()
            .tool(SIMULATION_TOOL, Some("Longhua District"), SIMULATION_REPORT)
            .generation(&second)
            .llm_end()
            .answer(DEMO_ANSWER)
    }

    pub fn push(mut self, step: ScriptStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn fragment(self, text: impl Into<String>) -> Self {
        self.push(ScriptStep::Fragment(text.into()))
    }

    /// One LLM generation, split into words for a token feed.
    pub fn generation(self, text: &str) -> Self {
        match self.feed {
            Feed::Captured => self.fragment(text),
            Feed::Tokens => text
                .split_inclusive(' ')
                .fold(self, |engine, word| engine.fragment(word)),
        }
    }

    pub fn llm_end(self) -> Self {
        self.push(ScriptStep::LlmEnd)
    }

    pub fn tool(self, name: &str, input: Option<&str>, output: &str) -> Self {
        self.push(ScriptStep::Tool {
            name: name.to_string(),
            input: input.map(str::to_string),
            output: output.to_string(),
        })
    }

    pub fn tool_failure(self, name: &str, message: &str) -> Self {
        self.push(ScriptStep::ToolFailure {
            name: name.to_string(),
            message: message.to_string(),
        })
    }

    pub fn fail(self, error: EngineError) -> Self {
        self.push(ScriptStep::Fail(error))
    }

    pub fn panic(self, message: &str) -> Self {
        self.push(ScriptStep::Panic(message.to_string()))
    }

    /// Set the value `run` returns.
    pub fn answer(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

impl AgentEngine for ScriptedEngine {
    fn feed(&self) -> Feed {
        self.feed
    }

    fn run(
        &self,
        _input: &TurnInput,
        observer: &mut dyn TraceObserver,
    ) -> Result<String, EngineError> {
        for step in &self.steps {
            match step {
                ScriptStep::Fragment(text) => observer.on_fragment(text),
                ScriptStep::LlmEnd => observer.on_llm_end(),
                ScriptStep::Tool {
                    name,
                    input,
                    output,
                } => {
                    observer.on_tool_start(name, input.as_deref());
                    observer.on_tool_end(output);
                }
                ScriptStep::ToolFailure { name, message } => {
                    observer.on_tool_start(name, None);
                    return Err(EngineError::Tool {
                        tool: name.clone(),
                        message: message.clone(),
                    });
                }
                ScriptStep::Fail(error) => return Err(error.clone()),
                ScriptStep::Panic(message) => panic!("{message}"),
            }
        }
        Ok(self.output.clone())
    }
}

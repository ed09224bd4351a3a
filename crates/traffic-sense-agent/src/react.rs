//! Text-based ReAct loop over a streaming LLM provider.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::runtime::Handle;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use traffic_sense_core::config::Config;
use traffic_sense_providers::{ChatMessage, CompletionRequest, LlmProvider};
use traffic_sense_stream::{Feed, TraceObserver, final_answer_text};
use traffic_sense_tools::ToolRegistry;

use crate::engine::{AgentEngine, EngineError, TurnInput};
use crate::prompt::{DEFAULT_PREFIX, STOP_SEQUENCE, build_react_prompt};

/// Returned when the loop runs out of iterations.
pub const ITERATION_LIMIT_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("valid action pattern")
});

#[derive(Debug, Clone)]
pub struct ReactSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub prefix: String,
    pub max_iterations: u32,
    pub feed: Feed,
}

impl ReactSettings {
    pub fn from_config(config: &Config) -> Self {
        let models = config.models();
        Self {
            model: models.model(),
            temperature: models.temperature(),
            max_tokens: models.max_tokens(),
            prefix: config
                .agent
                .as_ref()
                .and_then(|a| a.prefix.clone())
                .unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            max_iterations: config.max_iterations(),
            feed: config.feed_override().map(Feed::from).unwrap_or(Feed::Tokens),
        }
    }
}

/// One parsed model generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Finish(String),
    Act { tool: String, input: String },
    /// Neither an action nor a final answer; used as the answer as-is.
    Unparsed(String),
}

pub fn parse_step(generation: &str) -> Step {
    if let Some(answer) = final_answer_text(generation) {
        return Step::Finish(answer.trim().to_string());
    }
    if let Some(caps) = ACTION.captures(generation) {
        let tool = caps[1].trim().to_string();
        let input = caps[2].trim().trim_matches('"').to_string();
        if !tool.is_empty() {
            return Step::Act { tool, input };
        }
    }
    Step::Unparsed(generation.trim().to_string())
}

pub struct ReactEngine {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    settings: ReactSettings,
}

impl ReactEngine {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        settings: ReactSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            settings,
        }
    }

    /// Stream one generation, reporting it to the observer.
    fn generate(
        &self,
        handle: &Handle,
        prompt: &str,
        observer: &mut dyn TraceObserver,
    ) -> Result<String, EngineError> {
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
            stop: vec![STOP_SEQUENCE.to_string()],
        };
        let feed = self.settings.feed;

        // The prompt ends with "Thought:", so the generation continues a thought.
        if feed == Feed::Tokens {
            observer.on_fragment("Thought: ");
        }

        let generation = handle.block_on(async {
            let mut stream = self
                .provider
                .stream(&request)
                .await
                .map_err(|e| EngineError::Llm(e.to_string()))?;
            let mut text = String::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| EngineError::Llm(e.to_string()))?;
                if let Some(delta) = chunk.delta {
                    if feed == Feed::Tokens {
                        observer.on_fragment(&delta);
                    }
                    text.push_str(&delta);
                }
            }
            Ok::<_, EngineError>(text)
        })?;

        if feed == Feed::Captured {
            observer.on_fragment(&format!("Thought: {}\n", generation.trim()));
        }
        observer.on_llm_end();
        Ok(generation)
    }

    /// Run a tool and return its observation text.
    fn call_tool(
        &self,
        handle: &Handle,
        name: &str,
        input: &str,
        observer: &mut dyn TraceObserver,
    ) -> Result<String, EngineError> {
        observer.on_tool_start(name, Some(input));

        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Model asked for an unknown tool");
            let observation = format!(
                "{name} is not a valid tool, try one of [{}].",
                self.tools.list().join(", ")
            );
            observer.on_tool_end(&observation);
            return Ok(observation);
        };

        match handle.block_on(tool.execute(input)) {
            Ok(output) => {
                observer.on_tool_end(&output);
                Ok(output)
            }
            Err(e) => Err(EngineError::Tool {
                tool: name.to_string(),
                message: e.to_string(),
            }),
        }
    }
}

impl AgentEngine for ReactEngine {
    fn feed(&self) -> Feed {
        self.settings.feed
    }

    fn run(
        &self,
        input: &TurnInput,
        observer: &mut dyn TraceObserver,
    ) -> Result<String, EngineError> {
        let handle = Handle::try_current()
            .map_err(|e| EngineError::Chain(format!("no async runtime for the engine: {e}")))?;

        let prompt = build_react_prompt(
            &self.settings.prefix,
            &self.tools,
            &input.history,
            &input.message,
        );
        let mut scratchpad = String::new();

        for iteration in 0..self.settings.max_iterations {
            debug!(iteration, "ReAct iteration");
            let generation = self.generate(&handle, &format!("{prompt}{scratchpad}"), observer)?;

            match parse_step(&generation) {
                Step::Finish(answer) => {
                    info!(iteration, "Final answer reached");
                    return Ok(answer);
                }
                Step::Act { tool, input } => {
                    let observation = self.call_tool(&handle, &tool, &input, observer)?;
                    scratchpad.push_str(generation.trim_end());
                    scratchpad.push_str(&format!("\nObservation: {observation}\nThought:"));
                }
                Step::Unparsed(text) => {
                    warn!(iteration, "Could not parse model output, using it as the answer");
                    return Ok(text);
                }
            }
        }

        warn!(max_iterations = self.settings.max_iterations, "Iteration limit reached");
        Ok(ITERATION_LIMIT_MESSAGE.to_string())
    }
}

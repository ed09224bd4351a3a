//! Tools the agent can call during a turn.
//!
//! Each tool implements the [`Tool`] trait and takes its input as free text,
//! the way a ReAct `Action Input:` line supplies it.

use async_trait::async_trait;

pub mod traffic;

/// The core tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as written after `Action:`.
    fn name(&self) -> &str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// Execute the tool with the raw action input.
    async fn execute(&self, input: &str) -> anyhow::Result<String>;
}

/// Registry of available tools.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in traffic tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        traffic::register_all(&mut registry);
        registry
    }

    /// Register a tool; a tool with the same name is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.iter().find(|t| t.name() == name).map(|t| t.as_ref())
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// `name: description` lines for the prompt.
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("{}: {}", t.name(), t.description().trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

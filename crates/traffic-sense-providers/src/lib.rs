//! LLM provider abstraction.
//!
//! A provider streams the text of one chat completion as deltas. Only the
//! OpenAI chat-completions wire format is implemented; Azure OpenAI and
//! OpenRouter speak the same format behind different URLs and auth headers.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use traffic_sense_core::config::ModelsConfig;

pub mod openai;
pub mod sse;

pub use openai::OpenAiProvider;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Generation halts before any of these sequences.
    #[serde(default)]
    pub stop: Vec<String>,
}

/// A streamed chunk from the LLM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionChunk {
    pub delta: Option<String>,
    pub stop_reason: Option<String>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<CompletionChunk>> + Send>>;

/// The core LLM provider trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g., "openai", "azure").
    fn id(&self) -> &str;

    /// Stream a chat completion.
    async fn stream(&self, request: &CompletionRequest) -> anyhow::Result<ChunkStream>;
}

/// Build the configured provider.
pub fn from_config(models: &ModelsConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    Ok(Arc::new(OpenAiProvider::from_config(models)?))
}

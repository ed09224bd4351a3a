//! OpenAI Chat Completions API provider.
//!
//! Streams `/v1/chat/completions`. The same wire format serves OpenRouter and
//! Azure OpenAI deployments, which differ only in URL and auth header.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tracing::{debug, trace};
use traffic_sense_core::config::{ModelsConfig, ProviderKind};

use crate::sse::parse_sse_stream;
use crate::{ChatMessage, ChunkStream, CompletionChunk, CompletionRequest, LlmProvider};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api";
const AZURE_API_VERSION: &str = "2024-02-15-preview";

/// API style — determines URL layout and auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStyle {
    OpenAi,
    OpenRouter,
    Azure {
        deployment: String,
        api_version: String,
    },
}

pub struct OpenAiProvider {
    pub base_url: String,
    pub api_style: ApiStyle,
    api_key: String,
    provider_id: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn openai(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self::with_style(
            base_url.unwrap_or(OPENAI_BASE_URL),
            ApiStyle::OpenAi,
            "openai",
            api_key.into(),
        )
    }

    pub fn openrouter(base_url: Option<&str>, api_key: impl Into<String>) -> Self {
        Self::with_style(
            base_url.unwrap_or(OPENROUTER_BASE_URL),
            ApiStyle::OpenRouter,
            "openrouter",
            api_key.into(),
        )
    }

    pub fn azure(
        endpoint: &str,
        deployment: impl Into<String>,
        api_version: Option<&str>,
        api_key: impl Into<String>,
    ) -> Self {
        Self::with_style(
            endpoint,
            ApiStyle::Azure {
                deployment: deployment.into(),
                api_version: api_version.unwrap_or(AZURE_API_VERSION).to_string(),
            },
            "azure",
            api_key.into(),
        )
    }

    fn with_style(base_url: &str, api_style: ApiStyle, id: &str, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_style,
            api_key,
            provider_id: id.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Replace the HTTP client (e.g. to apply a request timeout).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Build a provider from the `models` config section.
    pub fn from_config(models: &ModelsConfig) -> anyhow::Result<Self> {
        let Some(api_key) = models.resolve_api_key() else {
            anyhow::bail!(
                "No API key configured for provider {:?} (set models.api_key or models.api_key_env)",
                models.provider
            );
        };
        let base_url = models.base_url.as_deref();

        let provider = match models.provider {
            ProviderKind::Openai => Self::openai(base_url, api_key),
            ProviderKind::Openrouter => Self::openrouter(base_url, api_key),
            ProviderKind::Azure => {
                let (Some(endpoint), Some(deployment)) = (base_url, &models.azure_deployment)
                else {
                    anyhow::bail!("Azure provider requires base_url and azure_deployment");
                };
                Self::azure(
                    endpoint,
                    deployment.clone(),
                    models.azure_api_version.as_deref(),
                    api_key,
                )
            }
        };

        let client = reqwest::Client::builder()
            .timeout(models.request_timeout())
            .build()?;
        Ok(provider.with_client(client))
    }

    /// Chat completions URL for this style.
    pub fn endpoint(&self) -> String {
        match &self.api_style {
            ApiStyle::OpenAi | ApiStyle::OpenRouter => {
                format!("{}/v1/chat/completions", self.base_url)
            }
            ApiStyle::Azure {
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{deployment}/chat/completions?api-version={api_version}",
                self.base_url
            ),
        }
    }

    fn request_body(&self, request: &CompletionRequest) -> OpenAiRequest {
        OpenAiRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            max_tokens: request.max_tokens,
            stream: true,
            temperature: request.temperature,
            stop: (!request.stop.is_empty()).then(|| request.stop.clone()),
        }
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What one SSE `data:` payload means.
#[derive(Debug, PartialEq, Eq)]
enum Parsed {
    Chunk(CompletionChunk),
    Skip,
    Done,
}

fn parse_data(data: &str) -> Parsed {
    let data = data.trim();
    // OpenAI terminates with "data: [DONE]"
    if data == "[DONE]" {
        return Parsed::Done;
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(c) => c,
        Err(e) => {
            trace!(%e, data, "Failed to parse OpenAI chunk");
            return Parsed::Skip;
        }
    };

    // Azure sends an initial chunk with no choices (content filter results).
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Parsed::Skip;
    };

    let delta = choice.delta.content.filter(|c| !c.is_empty());
    if delta.is_none() && choice.finish_reason.is_none() {
        return Parsed::Skip;
    }
    Parsed::Chunk(CompletionChunk {
        delta,
        stop_reason: choice.finish_reason,
    })
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn id(&self) -> &str {
        &self.provider_id
    }

    async fn stream(&self, request: &CompletionRequest) -> anyhow::Result<ChunkStream> {
        let body = self.request_body(request);

        debug!(model = %body.model, endpoint = %self.endpoint(), "Streaming chat completion");

        let mut req_builder = self
            .client
            .post(self.endpoint())
            .header("content-type", "application/json");

        req_builder = match self.api_style {
            ApiStyle::Azure { .. } => req_builder.header("api-key", self.api_key.as_str()),
            ApiStyle::OpenAi | ApiStyle::OpenRouter => {
                req_builder.header("authorization", format!("Bearer {}", self.api_key))
            }
        };

        let response = req_builder.json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("{} API error {status}: {body}", self.provider_id);
        }

        let sse_stream = parse_sse_stream(response);

        let chunk_stream = futures::stream::unfold(Box::pin(sse_stream), |mut sse| async move {
            loop {
                match sse.next().await {
                    Some(Ok(event)) => match parse_data(&event.data) {
                        Parsed::Chunk(chunk) => return Some((Ok(chunk), sse)),
                        Parsed::Skip => continue,
                        Parsed::Done => return None,
                    },
                    Some(Err(e)) => return Some((Err(e), sse)),
                    None => return None,
                }
            }
        });

        Ok(Box::pin(chunk_stream))
    }
}

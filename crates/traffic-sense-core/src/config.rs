//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficSenseError};

/// Top-level TrafficSense configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Allow any origin (the web client is usually served elsewhere).
    #[serde(default = "default_true")]
    pub cors: bool,
}

fn default_port() -> u16 {
    8000
}

fn default_true() -> bool {
    true
}

/// Which engine drives a turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// ReAct loop over a streaming LLM provider.
    #[default]
    React,
    /// Replays the built-in traffic scenario without calling any LLM.
    Scripted,
}

/// How the reasoning trace reaches the stream layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// Token callbacks, one fragment per streamed delta.
    Tokens,
    /// Whole text chunks (captured verbose output, full generations).
    Captured,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub engine: EngineKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    /// Persona text prepended to the ReAct prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Override the feed kind the engine declares.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<FeedKind>,
}

/// LLM API flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Openai,
    Azure,
    Openrouter,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub provider: ProviderKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_deployment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_api_version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl ModelsConfig {
    /// Resolve the API key: check `api_key` first, then the `api_key_env` variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_secret_field(&self.api_key, &self.api_key_env)
    }

    pub fn model(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.provider {
            ProviderKind::Openrouter => "openai/gpt-4o-mini".into(),
            ProviderKind::Openai | ProviderKind::Azure => "gpt-4o-mini".into(),
        })
    }

    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(0.0)
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(4096)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(60))
    }
}

/// Tuning for the trace-to-event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Consumer pull timeout in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum characters of an observation shown to clients.
    #[serde(default = "default_observation_cap")]
    pub observation_cap: usize,

    /// Thoughts and observations must be longer than this to be emitted.
    #[serde(default = "default_min_segment_chars")]
    pub min_segment_chars: usize,

    /// Emit `thought_start` / `action_start` / `response_complete`.
    #[serde(default)]
    pub lifecycle_events: bool,
}

fn default_poll_interval_ms() -> u64 {
    20
}

fn default_observation_cap() -> usize {
    200
}

fn default_min_segment_chars() -> usize {
    5
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            observation_cap: default_observation_cap(),
            min_segment_chars: default_min_segment_chars(),
            lifecycle_events: false,
        }
    }
}

impl StreamConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "traffic_sense_stream=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        if let Ok(val) = std::env::var(env) {
            if !val.is_empty() {
                return Some(val);
            }
        }
    }
    None
}

static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env reference pattern"));

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

impl Config {
    /// Load config from a JSON5 (or YAML) file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        if is_yaml(path) {
            return Ok(serde_yaml::from_str(&substituted)?);
        }

        json5::from_str(&substituted).map_err(|e| TrafficSenseError::Config(e.to_string()))
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        data_dir().join("config.json5")
    }

    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or_else(default_port)
    }

    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn cors_enabled(&self) -> bool {
        self.gateway.as_ref().is_none_or(|g| g.cors)
    }

    pub fn engine(&self) -> EngineKind {
        self.agent.as_ref().map(|a| a.engine).unwrap_or_default()
    }

    pub fn max_iterations(&self) -> u32 {
        self.agent
            .as_ref()
            .and_then(|a| a.max_iterations)
            .unwrap_or(12)
    }

    pub fn feed_override(&self) -> Option<FeedKind> {
        self.agent.as_ref().and_then(|a| a.feed)
    }

    pub fn models(&self) -> ModelsConfig {
        self.models.clone().unwrap_or_default()
    }

    pub fn stream(&self) -> StreamConfig {
        self.stream.clone().unwrap_or_default()
    }

    /// Look up a config value by dotted path (e.g. `stream.poll_interval_ms`).
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.engine() == EngineKind::React && self.models().resolve_api_key().is_none() {
            warnings.push(
                "React engine selected but no model API key is configured".to_string(),
            );
        }

        let models = self.models();
        if models.provider == ProviderKind::Azure
            && (models.base_url.is_none() || models.azure_deployment.is_none())
        {
            errors.push("Azure provider requires base_url and azure_deployment".to_string());
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
        }

        let stream = self.stream();
        if stream.poll_interval_ms == 0 {
            errors.push("stream.poll_interval_ms must be greater than 0".to_string());
        }
        if stream.observation_cap == 0 {
            errors.push("stream.observation_cap must be greater than 0".to_string());
        }

        (warnings, errors)
    }

    /// Save config to a file as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Base directory for TrafficSense data: `~/.traffic_sense/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".traffic_sense")
}

//! HTTP request and response bodies.
//!
//! The streaming endpoint writes [`StreamEvent`](crate::event::StreamEvent)
//! lines; every other endpoint answers with one of the JSON records below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Outcome status of a non-streaming turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    #[default]
    Success,
    Error,
}

/// Aggregate result of a non-streaming turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    /// Reasoning-trace entries recorded during this turn.
    pub thoughts: Vec<String>,
    #[serde(default)]
    pub status: ChatStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: ChatStatus,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: ChatStatus::Error,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetResponse {
    pub status: ChatStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ResetResponse {
    pub fn cleared() -> Self {
        Self {
            status: ChatStatus::Success,
            message: "Conversation history cleared".into(),
            timestamp: Utc::now(),
        }
    }
}

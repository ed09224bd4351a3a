//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};
use traffic_sense_core::protocol::{
    ChatRequest, ChatResponse, ChatStatus, ErrorResponse, HealthResponse, ResetResponse,
};

use crate::state::GatewayState;

pub async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "TrafficSenseAgent API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "chat_stream": "/api/chat/stream",
            "chat": "/api/chat",
            "reset": "/api/reset",
        },
    }))
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// One JSON event per line; the body ends after the `done` line.
pub async fn chat_stream_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    info!(message_len = request.message.len(), "Streaming chat request");
    #[cfg(feature = "metrics")]
    crate::metrics::record_turn("stream");

    let events = state.service.chat_stream(&request.message).await;
    let body = events.map(|event| {
        #[cfg(feature = "metrics")]
        crate::metrics::record_event(event.kind.as_str());
        Ok::<_, Infallible>(Bytes::from(event.to_line()))
    });

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

pub async fn chat_handler(
    State(state): State<Arc<GatewayState>>,
    Json(request): Json<ChatRequest>,
) -> Response {
    info!(message_len = request.message.len(), "Chat request");
    #[cfg(feature = "metrics")]
    crate::metrics::record_turn("chat");
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let outcome = state.service.chat(&request.message).await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_turn_duration(start.elapsed().as_secs_f64());

    match outcome.status {
        ChatStatus::Success => Json(ChatResponse::from(outcome)).into_response(),
        ChatStatus::Error => {
            warn!(error = %outcome.response, "Chat turn failed");
            #[cfg(feature = "metrics")]
            crate::metrics::record_error("chat");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(outcome.response, "Error processing chat request")),
            )
                .into_response()
        }
    }
}

pub async fn reset_handler(State(state): State<Arc<GatewayState>>) -> Json<ResetResponse> {
    state.service.reset().await;
    Json(ResetResponse::cleared())
}

#[cfg(feature = "metrics")]
pub async fn metrics_handler(State(state): State<Arc<GatewayState>>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request;
    use tower::ServiceExt;
    use traffic_sense_agent::{AgentService, EngineError, ScriptedEngine};
    use traffic_sense_core::config::Config;
    use traffic_sense_stream::{Feed, StreamEvent, StreamSettings};

    use super::*;
    use crate::server::router;

    fn state_with(engine: ScriptedEngine) -> Arc<GatewayState> {
        let settings = StreamSettings {
            poll_interval: Duration::from_millis(5),
            ..StreamSettings::default()
        };
        let service = AgentService::new(Arc::new(engine), settings);
        Arc::new(GatewayState::new(
            Arc::new(Config::default()),
            Arc::new(service),
        ))
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let app = router(state_with(ScriptedEngine::new(Feed::Tokens)));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["message"], "TrafficSenseAgent API");
        assert_eq!(body["endpoints"]["chat_stream"], "/api/chat/stream");
    }

    #[tokio::test]
    async fn test_stream_body_is_json_lines() {
        let app = router(state_with(ScriptedEngine::traffic_demo(Feed::Captured)));
        let response = app
            .oneshot(post("/api/chat/stream", r#"{"message":"How is Longhua?"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = String::from_utf8(body_bytes(response).await).unwrap();
        let events: Vec<StreamEvent> = body
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.last(), Some(&StreamEvent::done()));
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
    }

    #[tokio::test]
    async fn test_chat_failure_is_500() {
        let engine = ScriptedEngine::new(Feed::Tokens).fail(EngineError::Chain("bad output".into()));
        let app = router(state_with(engine));
        let response = app.oneshot(post("/api/chat", r#"{"message":"hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "Error processing request: bad output");
    }

    #[tokio::test]
    async fn test_reset() {
        let app = router(state_with(ScriptedEngine::new(Feed::Tokens)));
        let response = app
            .oneshot(Request::post("/api/reset").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["message"], "Conversation history cleared");
    }
}

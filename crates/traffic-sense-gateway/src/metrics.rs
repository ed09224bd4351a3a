//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

/// Record a turn starting, labelled by endpoint (`stream` or `chat`).
pub fn record_turn(mode: &'static str) {
    metrics::counter!("chat_turns_total", "mode" => mode).increment(1);
}

/// Record one event written to a streaming response.
pub fn record_event(kind: &str) {
    let labels = [("kind", kind.to_string())];
    metrics::counter!("stream_events_total", &labels).increment(1);
}

/// Record a failed turn.
pub fn record_error(kind: &str) {
    let labels = [("kind", kind.to_string())];
    metrics::counter!("errors_total", &labels).increment(1);
}

/// Record how long a non-streaming turn took.
pub fn record_turn_duration(duration_secs: f64) {
    metrics::histogram!("chat_turn_duration_seconds").record(duration_secs);
}

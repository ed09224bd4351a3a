//! Axum-based HTTP server.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::routes;
use crate::state::GatewayState;

/// All routes, with CORS when the config enables it.
pub fn router(state: Arc<GatewayState>) -> Router {
    let cors = state.config.cors_enabled();

    let mut app = Router::new()
        .route("/", get(routes::root_handler))
        .route("/api/health", get(routes::health_handler))
        .route("/api/chat/stream", post(routes::chat_stream_handler))
        .route("/api/chat", post(routes::chat_handler))
        .route("/api/reset", post(routes::reset_handler));

    #[cfg(feature = "metrics")]
    {
        app = app.route("/metrics", get(routes::metrics_handler));
    }

    if cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Start the gateway and serve until Ctrl-C.
pub async fn start_gateway(state: Arc<GatewayState>, port: u16) -> anyhow::Result<()> {
    let bind_addr = state.config.gateway_bind();
    let app = router(state);

    let addr = format!("{bind_addr}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Gateway listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            // Without a signal handler the server runs until killed.
            warn!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

// ABOUTME: HTTP chat gateway serving web, Slack and Teams-style hosts over one channel API.
// ABOUTME: Builds the axum router around a shared ChannelHandler and runs it until ctrl-c.

pub mod web;

use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    routing::{delete, get, post},
    Router,
};
use pinion_core::ChannelHandler;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every request
pub struct GatewayState {
    pub handler: ChannelHandler,
}

/// Build the gateway router
pub fn router(handler: ChannelHandler) -> Router {
    let state = Arc::new(GatewayState { handler });

    Router::new()
        .route("/health", get(web::health_handler))
        .route(
            "/api/conversations/{id}/messages",
            post(web::send_message_handler).get(web::history_handler),
        )
        .route("/api/conversations/{id}/poll", post(web::poll_handler))
        .route("/api/conversations/{id}", delete(web::end_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the gateway on the configured address until ctrl-c, then tear down
/// every conversation.
pub async fn serve(config: &Config, handler: ChannelHandler) -> Result<()> {
    let sessions = Arc::clone(handler.sessions());
    let app = router(handler);

    let addr = config.bind_addr();
    tracing::info!(addr = %addr, "Starting chat gateway");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Shutdown signal received"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            }
        })
        .await
        .context("Gateway server failed")?;

    let open = sessions.len().await;
    sessions.shutdown_all().await;
    tracing::info!(sessions = open, "Gateway stopped");
    Ok(())
}

// ABOUTME: Request handlers for the chat gateway's conversation API.
// ABOUTME: Send messages, read history, wait for live-agent updates, and end conversations.

use super::GatewayState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use pinion_client::ChatMessage;
use pinion_core::channel::ENDED_REPLY;
use pinion_core::conversation::Conversation;
use pinion_core::{Attachment, ChannelEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub replies: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollRequest {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub updated: bool,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EndResponse {
    pub ended: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub sessions: usize,
}

fn not_found(id: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("No active conversation: {}", id),
        }),
    )
}

pub async fn health_handler(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.handler.sessions().len().await,
    })
}

pub async fn send_message_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(request): Json<MessageRequest>,
) -> Json<MessageResponse> {
    tracing::info!(
        conversation_id = %id,
        text_len = request.text.len(),
        has_attachment = request.attachment.is_some(),
        "Message received"
    );

    let event = ChannelEvent {
        text: request.text,
        attachments: request.attachment.into_iter().collect(),
    };
    let replies = state.handler.handle(&id, event).await;
    Json(MessageResponse { replies })
}

pub async fn history_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, (StatusCode, Json<ErrorResponse>)> {
    let entry = state
        .handler
        .sessions()
        .get(&id)
        .await
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(HistoryResponse {
        messages: entry.client().messages(),
    }))
}

/// Wait for news from the live agent. A requested wait is capped at the
/// configured live-agent wait; without one this is the short "continue" wait.
pub async fn poll_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
    Json(request): Json<PollRequest>,
) -> Result<Json<PollResponse>, (StatusCode, Json<ErrorResponse>)> {
    let entry = state
        .handler
        .sessions()
        .get(&id)
        .await
        .ok_or_else(|| not_found(&id))?;

    let poller = state.handler.poller();
    let updated = match request.timeout_secs {
        Some(secs) => {
            let timeout = Duration::from_secs(secs).min(poller.config().live_wait());
            poller.poll_client(entry.client(), timeout).await
        }
        None => {
            Conversation::new(entry.client(), poller.clone())
                .continue_waiting()
                .await
        }
    };
    tracing::debug!(conversation_id = %id, updated, "Poll finished");

    Ok(Json(PollResponse {
        updated,
        messages: entry.client().messages(),
    }))
}

pub async fn end_handler(
    State(state): State<Arc<GatewayState>>,
    Path(id): Path<String>,
) -> Json<EndResponse> {
    let message = state.handler.end(&id).await;
    Json(EndResponse {
        ended: message == ENDED_REPLY,
        message,
    })
}

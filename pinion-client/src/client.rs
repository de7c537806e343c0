// ABOUTME: Core ConversationClient trait that every backend implements.
// ABOUTME: Defines the session snapshot, chat history types, and agent display variables.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Who authored a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Prefix used when rendering a message as a single line
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Agent",
        }
    }
}

/// One entry in the displayed conversation history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Display variables published by the agent definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVars {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    /// Greeting shown before the user has said anything
    pub start: Option<String>,
    pub transfer_allowed: bool,
}

/// Read-only snapshot of the externally owned session.
///
/// The client mutates the underlying state while it runs operations; callers
/// such as the update poller only ever read a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: Option<String>,
    /// Monotonic time of the most recent push-style update from the live transport
    pub last_live_update: Option<Instant>,
    /// Last freshness marker observed from the server
    pub last_known_marker: Option<String>,
    /// Whether the live-agent listener is currently connected
    pub live_transfer_active: bool,
    /// Whether the agent asked to hand the conversation to a live operator
    pub transfer_requested: bool,
    /// Follow-up intent queued by the last AI turn
    pub next_intent: Option<String>,
}

/// Asynchronous conversation client.
///
/// Futures are `Send` so they can be handed to a background worker that
/// drives them on behalf of a synchronous caller.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Snapshot of the session fields the front-ends consume
    fn state(&self) -> SessionState;

    /// Agent display variables
    fn agent_vars(&self) -> AgentVars;

    /// Conversation history for display
    fn messages(&self) -> Vec<ChatMessage>;

    /// Append a message to the local history
    fn add_message(&self, message: ChatMessage);

    /// Whether the live-agent listener is connected
    fn live_listener_active(&self) -> bool {
        self.state().live_transfer_active
    }

    /// Run the automated agent on user input and return its reply.
    ///
    /// The reply must also be appended to [`messages`](Self::messages) as an
    /// assistant message: front-ends render a turn from the history, not
    /// from the returned string.
    async fn process_user_input(&self, text: &str) -> Result<String>;

    /// Persist the session to the server
    async fn update_session(&self) -> Result<()>;

    /// Ask the server for its current modification marker.
    ///
    /// Returns the marker (if any) and backend-specific metadata.
    async fn fetch_server_marker(&self) -> Result<(Option<String>, Value)>;

    /// Connect the live-agent listener. `Ok(false)` means the service declined.
    async fn start_live_listener(&self) -> Result<bool>;

    /// Send a message to the live operator
    async fn send_live_message(&self, text: &str) -> Result<()>;

    /// End the live-agent session
    async fn end_live_session(&self) -> Result<()>;

    /// Release transport resources
    async fn close(&self) -> Result<()>;
}

// ABOUTME: Platform-agnostic handling of one inbound channel message (Slack, Teams, web chat).
// ABOUTME: Loads agents from uploaded files, collects key secrets, routes /end, and runs conversation turns.

use crate::conversation::{Conversation, HandoffStatus, TurnOutcome};
use crate::poller::UpdatePoller;
use crate::session_registry::{SessionEntry, SessionRegistry};
use crate::text::{clean_channel_text, describe_wait};
use pinion_client::{ClientConfig, ClientError, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An uploaded file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub content: String,
}

/// One inbound message on a channel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEvent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl ChannelEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

pub const ENDED_REPLY: &str = "Conversation ended and session cleared.";
pub const NO_SESSION_REPLY: &str = "No active session to end.";
pub const NO_AGENT_REPLY: &str =
    "No agent is active in this channel. Upload an `.aia` file or ensure environment variables are set.";
pub const SECRET_PROMPT_REPLY: &str =
    "This AIA file is private and requires a secret key. Please reply with the key.";
pub const LIVE_UNAVAILABLE_REPLY: &str = "Could not connect to live agent service.";
pub const HANDOFF_REPLY: &str = "Transfer to live agent initiated... Waiting for agent to connect.";

/// Handles channel messages against a shared [`SessionRegistry`]
#[derive(Clone)]
pub struct ChannelHandler {
    sessions: Arc<SessionRegistry>,
    client_config: ClientConfig,
    poller: UpdatePoller,
}

impl ChannelHandler {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        client_config: ClientConfig,
        poller: UpdatePoller,
    ) -> Self {
        Self {
            sessions,
            client_config,
            poller,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn poller(&self) -> &UpdatePoller {
        &self.poller
    }

    /// Handle one message and return the replies to post, in order
    pub async fn handle(&self, conversation_id: &str, event: ChannelEvent) -> Vec<String> {
        let text = clean_channel_text(&event.text);

        if let Some(source) = self.sessions.take_pending_secret(conversation_id) {
            return self.load_private_agent(conversation_id, source, text).await;
        }

        if let Some(file) = event
            .attachments
            .into_iter()
            .find(|a| a.name.to_lowercase().ends_with(".aia"))
        {
            return self.load_agent_file(conversation_id, file).await;
        }

        if text.is_empty() {
            return Vec::new();
        }

        if matches!(text.to_lowercase().as_str(), "/end" | "!end") {
            return vec![self.end(conversation_id).await];
        }

        let entry = match self
            .sessions
            .get_or_create(conversation_id, &self.client_config)
            .await
        {
            Ok(Some(entry)) => entry,
            Ok(None) => return vec![NO_AGENT_REPLY.to_string()],
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Failed to initialize client");
                return vec![NO_AGENT_REPLY.to_string()];
            }
        };

        self.run_turn(&entry, &text).await
    }

    /// End a conversation and return the notice to post
    pub async fn end(&self, conversation_id: &str) -> String {
        if self.sessions.end(conversation_id).await {
            ENDED_REPLY.to_string()
        } else {
            NO_SESSION_REPLY.to_string()
        }
    }

    async fn run_turn(&self, entry: &SessionEntry, text: &str) -> Vec<String> {
        let client = entry.client();
        let seen = client.messages().len();
        let conversation = Conversation::new(client, self.poller.clone());

        let outcome = match conversation.send(text).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(conversation_id = %entry.id(), error = %e, "Agent turn failed");
                return vec![format!("Agent Error: {}", e)];
            }
        };

        // Everything the agent or operator said during this turn, in order
        let mut said = conversation
            .client()
            .messages()
            .into_iter()
            .skip(seen)
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content);

        let (mut replies, status) = match outcome {
            TurnOutcome::Replied {
                replies: answers,
                handoff,
            } => {
                let mut replies: Vec<String> = said.by_ref().take(answers.len()).collect();
                // The transfer notice precedes anything the operator said while we waited
                if matches!(
                    handoff,
                    Some(HandoffStatus::Updated | HandoffStatus::TimedOut)
                ) {
                    replies.push(HANDOFF_REPLY.to_string());
                }
                (replies, handoff)
            }
            TurnOutcome::Live(status) => (Vec::new(), Some(status)),
        };
        replies.extend(said);

        match status {
            Some(HandoffStatus::TimedOut) => replies.push(format!(
                "No new messages in the last {}. Send another message or /end.",
                describe_wait(self.poller.config().live_wait())
            )),
            Some(HandoffStatus::Unavailable) => replies.push(LIVE_UNAVAILABLE_REPLY.to_string()),
            Some(HandoffStatus::Updated) | None => {}
        }

        replies
    }

    async fn load_agent_file(&self, conversation_id: &str, file: Attachment) -> Vec<String> {
        let config = self.client_config.with_agent_source(file.content.clone(), None);
        match self.sessions.load(conversation_id, &config).await {
            Ok(entry) => vec![loaded_reply(&entry, " from file")],
            Err(e) if ClientError::is_key_secret_required(&e) => {
                tracing::info!(conversation_id = %conversation_id, file = %file.name, "Agent file requires a key secret");
                self.sessions
                    .set_pending_secret(conversation_id, file.content);
                vec![SECRET_PROMPT_REPLY.to_string()]
            }
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Error processing agent file");
                vec![format!("Could not load agent: {}", e)]
            }
        }
    }

    async fn load_private_agent(
        &self,
        conversation_id: &str,
        source: String,
        key_secret: String,
    ) -> Vec<String> {
        let mut replies = vec!["Decrypting and loading agent...".to_string()];
        let config = self
            .client_config
            .with_agent_source(source, Some(key_secret));
        match self.sessions.load(conversation_id, &config).await {
            Ok(entry) => replies.push(loaded_reply(&entry, "")),
            Err(e) => {
                tracing::error!(conversation_id = %conversation_id, error = %e, "Error loading agent with secret");
                replies.push(format!("Failed to load agent: {}", e));
            }
        }
        replies
    }
}

fn loaded_reply(entry: &SessionEntry, origin: &str) -> String {
    let vars = entry.client().agent_vars();
    let title = vars.title.unwrap_or_else(|| "Agent".to_string());
    let greeting = vars
        .start
        .unwrap_or_else(|| "Agent loaded successfully!".to_string());
    format!("*{}* loaded{}.\n{}", title, origin, greeting)
}

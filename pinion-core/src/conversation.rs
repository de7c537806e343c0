// ABOUTME: Shared turn logic for every front-end: AI replies, follow-up intents, live-agent handoff.
// ABOUTME: Front-ends render the TurnOutcome; the live wait uses the UpdatePoller.

use crate::poller::UpdatePoller;
use anyhow::Result;
use pinion_client::{ChatMessage, ConversationClient};
use std::sync::Arc;

/// What happened while waiting on the live operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStatus {
    /// New content arrived; the caller should refresh its view
    Updated,
    /// Nothing arrived in time; offer "continue" or "end"
    TimedOut,
    /// The live-agent service could not be reached
    Unavailable,
}

/// Result of one user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The automated agent answered. `handoff` is set when the answer
    /// requested a transfer to a live operator.
    Replied {
        replies: Vec<String>,
        handoff: Option<HandoffStatus>,
    },
    /// The conversation is with a live operator
    Live(HandoffStatus),
}

/// One conversation as seen by a front-end
#[derive(Clone)]
pub struct Conversation {
    client: Arc<dyn ConversationClient>,
    poller: UpdatePoller,
}

impl Conversation {
    pub fn new(client: Arc<dyn ConversationClient>, poller: UpdatePoller) -> Self {
        Self { client, poller }
    }

    pub fn client(&self) -> &Arc<dyn ConversationClient> {
        &self.client
    }

    pub fn poller(&self) -> &UpdatePoller {
        &self.poller
    }

    /// Handle one message from the user
    pub async fn send(&self, text: &str) -> Result<TurnOutcome> {
        self.client.add_message(ChatMessage::user(text));

        if self.client.state().transfer_requested {
            return Ok(TurnOutcome::Live(self.send_live(text).await?));
        }

        let mut replies = vec![self.client.process_user_input(text).await?];
        self.client.update_session().await?;

        if let Some(intent) = self.client.state().next_intent {
            tracing::debug!(intent = %intent, "Processing follow-up intent");
            replies.push(self.client.process_user_input(text).await?);
            self.client.update_session().await?;
        }

        let handoff = if self.client.state().transfer_requested {
            tracing::info!("Transfer to live agent requested");
            Some(self.wait_for_operator().await)
        } else {
            None
        };

        Ok(TurnOutcome::Replied { replies, handoff })
    }

    async fn send_live(&self, text: &str) -> Result<HandoffStatus> {
        if !self.ensure_live_listener().await {
            return Ok(HandoffStatus::Unavailable);
        }
        self.client.update_session().await?;
        self.client.send_live_message(text).await?;
        Ok(self.poll(self.poller.config().live_wait()).await)
    }

    async fn wait_for_operator(&self) -> HandoffStatus {
        if !self.ensure_live_listener().await {
            return HandoffStatus::Unavailable;
        }
        self.poll(self.poller.config().live_wait()).await
    }

    async fn poll(&self, timeout: std::time::Duration) -> HandoffStatus {
        if self.poller.poll_client(Arc::clone(&self.client), timeout).await {
            HandoffStatus::Updated
        } else {
            HandoffStatus::TimedOut
        }
    }

    /// Connect the live-agent listener if it is not already connected
    pub async fn ensure_live_listener(&self) -> bool {
        if self.client.live_listener_active() {
            return true;
        }
        match self.client.start_live_listener().await {
            Ok(true) => {
                tracing::info!("Connected to live agent service");
                true
            }
            Ok(false) => {
                tracing::warn!("Live agent service declined the connection");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start live agent listener");
                false
            }
        }
    }

    /// Wait a short while for news, as when the user asks to continue.
    ///
    /// Returns true when the view should be refreshed.
    pub async fn continue_waiting(&self) -> bool {
        self.poller
            .poll_client(Arc::clone(&self.client), self.poller.config().continue_wait())
            .await
    }

    /// End the live session
    pub async fn end(&self) -> Result<()> {
        self.client.end_live_session().await
    }
}

// ABOUTME: Mock client for testing - returns pre-configured replies.
// ABOUTME: Simulates the live-agent transport and server freshness markers without a network.
//!
//! # Example
//!
//! ```no_run
//! use pinion_client::backends::mock::MockClient;
//!
//! # async fn example() {
//! let mock = MockClient::new()
//!     .on_input("hello").respond_text("Hi there!")
//!     .on_input("human").respond_with_transfer("Connecting you to an operator");
//!
//! let client = mock.clone().into_client();
//! let reply = client.process_user_input("hello").await.unwrap();
//! assert_eq!(reply, "Hi there!");
//!
//! // Simulate the operator answering over the live transport
//! mock.push_live_reply("Operator here");
//! # }
//! ```

use crate::client::{AgentVars, ChatMessage, ConversationClient, SessionState};
use crate::config::ClientConfig;
use crate::error::ClientError;
use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// Prefix marking a mock agent definition as private
pub const PRIVATE_SOURCE_PREFIX: &str = "private:";

/// Mock conversation client. Clones share state, so a test can keep one
/// clone to drive the simulated transport while the other is in use.
#[derive(Clone)]
pub struct MockClient {
    state: Arc<Mutex<MockState>>,
}

struct Expectation {
    pattern: String,
    reply: std::result::Result<String, String>,
    transfer: bool,
    next_intent: Option<String>,
}

#[derive(Default)]
struct MockState {
    vars: AgentVars,
    expectations: VecDeque<Expectation>,
    history: Vec<ChatMessage>,
    session: SessionState,
    server_marker: Option<String>,
    revision: u64,
    live_available: bool,
    live_reply: Option<String>,
    live_sent: Vec<String>,
    marker_failures: usize,
    marker_checks: usize,
    updates: usize,
    ended: bool,
    closed: bool,
}

impl MockClient {
    /// Create a mock with no expectations and a working live transport
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                live_available: true,
                session: SessionState {
                    session_id: Some("mock-session-1".to_string()),
                    ..SessionState::default()
                },
                ..MockState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the agent display variables
    pub fn with_vars(self, vars: AgentVars) -> Self {
        self.lock().vars = vars;
        self
    }

    /// Make `start_live_listener` report that the service declined
    pub fn live_unavailable(self) -> Self {
        self.lock().live_available = false;
        self
    }

    /// Answer every live message with `text` over the simulated transport
    pub fn with_live_reply(self, text: &str) -> Self {
        self.lock().live_reply = Some(text.to_string());
        self
    }

    /// Start a transfer request before any input is processed
    pub fn with_transfer_requested(self) -> Self {
        self.lock().session.transfer_requested = true;
        self
    }

    /// Set up an expectation for input containing `pattern`
    pub fn on_input(self, pattern: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            client: self,
            pattern: pattern.to_string(),
        }
    }

    /// Wrap this mock as a shared trait object
    pub fn into_client(self) -> Arc<dyn ConversationClient> {
        Arc::new(self)
    }

    /// Simulate a message arriving on the live transport
    pub fn push_live_reply(&self, text: &str) {
        let mut state = self.lock();
        state.history.push(ChatMessage::assistant(text));
        state.session.last_live_update = Some(Instant::now());
    }

    /// Simulate another party changing the conversation on the server
    pub fn set_server_marker(&self, marker: &str) {
        self.lock().server_marker = Some(marker.to_string());
    }

    /// Make the next `count` marker checks fail
    pub fn fail_marker_checks(&self, count: usize) {
        self.lock().marker_failures = count;
    }

    /// Number of `fetch_server_marker` calls so far
    pub fn marker_checks(&self) -> usize {
        self.lock().marker_checks
    }

    /// Number of `update_session` calls so far
    pub fn updates(&self) -> usize {
        self.lock().updates
    }

    /// Messages sent to the live operator
    pub fn live_messages(&self) -> Vec<String> {
        self.lock().live_sent.clone()
    }

    /// Whether `end_live_session` was called
    pub fn ended(&self) -> bool {
        self.lock().ended
    }

    /// Whether `close` was called
    pub fn closed(&self) -> bool {
        self.lock().closed
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::ClientFactory {
        Box::new(|config: ClientConfig| create_from_config(config).boxed())
    }
}

/// Build a mock the way a real backend would: from an agent file or credentials.
///
/// An agent source starting with `private:<secret>` demands that exact key secret.
async fn create_from_config(config: ClientConfig) -> Result<Arc<dyn ConversationClient>> {
    let mut vars = AgentVars {
        title: Some("Mock Agent".to_string()),
        subtitle: config.agent_id.clone(),
        start: Some("Hello! How can I help you today?".to_string()),
        transfer_allowed: true,
    };

    if let Some(source) = config.aia_source.as_deref() {
        if let Some(rest) = source.strip_prefix(PRIVATE_SOURCE_PREFIX) {
            let expected = rest.lines().next().unwrap_or_default().trim();
            match config.key_secret.as_deref() {
                None => return Err(ClientError::KeySecretRequired.into()),
                Some(secret) if secret.trim() != expected => {
                    return Err(ClientError::Backend("invalid key_secret".to_string()).into());
                }
                Some(_) => {}
            }
        }
        vars.subtitle = Some("Loaded from agent file".to_string());
    } else if !config.has_credentials() {
        return Err(ClientError::NotConfigured(
            "agent_id, host_url, client_id and client_secret are required".to_string(),
        )
        .into());
    }

    tracing::debug!(title = ?vars.title, "Created mock client");
    Ok(MockClient::new().with_vars(vars).into_client())
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for setting up mock expectations with a fluent API
pub struct ExpectationBuilder {
    client: MockClient,
    pattern: String,
}

impl ExpectationBuilder {
    fn push(self, expectation: Expectation) -> MockClient {
        self.client.lock().expectations.push_back(expectation);
        self.client
    }

    /// Reply with plain text
    pub fn respond_text(self, text: &str) -> MockClient {
        let pattern = self.pattern.clone();
        self.push(Expectation {
            pattern,
            reply: Ok(text.to_string()),
            transfer: false,
            next_intent: None,
        })
    }

    /// Fail the call with a backend error
    pub fn respond_error(self, message: &str) -> MockClient {
        let pattern = self.pattern.clone();
        self.push(Expectation {
            pattern,
            reply: Err(message.to_string()),
            transfer: false,
            next_intent: None,
        })
    }

    /// Reply and request a live-agent transfer
    pub fn respond_with_transfer(self, text: &str) -> MockClient {
        let pattern = self.pattern.clone();
        self.push(Expectation {
            pattern,
            reply: Ok(text.to_string()),
            transfer: true,
            next_intent: None,
        })
    }

    /// Reply and queue a follow-up intent
    pub fn respond_with_intent(self, text: &str, intent: &str) -> MockClient {
        let pattern = self.pattern.clone();
        self.push(Expectation {
            pattern,
            reply: Ok(text.to_string()),
            transfer: false,
            next_intent: Some(intent.to_string()),
        })
    }
}

#[async_trait]
impl ConversationClient for MockClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn state(&self) -> SessionState {
        self.lock().session.clone()
    }

    fn agent_vars(&self) -> AgentVars {
        self.lock().vars.clone()
    }

    fn messages(&self) -> Vec<ChatMessage> {
        self.lock().history.clone()
    }

    fn add_message(&self, message: ChatMessage) {
        self.lock().history.push(message);
    }

    async fn process_user_input(&self, text: &str) -> Result<String> {
        let mut state = self.lock();

        // Oldest matching expectation wins, so in-order prompts stay deterministic
        let expectation = state
            .expectations
            .iter()
            .position(|e| text.contains(&e.pattern))
            .and_then(|i| state.expectations.remove(i));

        let Some(expectation) = expectation else {
            state.session.next_intent = None;
            let reply = format!("Mock: no expectation for '{}'", text);
            state.history.push(ChatMessage::assistant(reply.clone()));
            return Ok(reply);
        };

        state.session.next_intent = expectation.next_intent;
        if expectation.transfer {
            state.session.transfer_requested = true;
        }
        match expectation.reply {
            Ok(reply) => {
                state.history.push(ChatMessage::assistant(reply.clone()));
                Ok(reply)
            }
            Err(message) => Err(ClientError::Backend(message).into()),
        }
    }

    async fn update_session(&self) -> Result<()> {
        let mut state = self.lock();
        state.updates += 1;
        state.revision += 1;
        let marker = format!("rev-{}", state.revision);
        state.server_marker = Some(marker.clone());
        state.session.last_known_marker = Some(marker);
        Ok(())
    }

    async fn fetch_server_marker(&self) -> Result<(Option<String>, Value)> {
        let mut state = self.lock();
        state.marker_checks += 1;
        if state.marker_failures > 0 {
            state.marker_failures -= 1;
            return Err(ClientError::Backend("marker check unavailable".to_string()).into());
        }
        Ok((
            state.server_marker.clone(),
            json!({ "revision": state.revision }),
        ))
    }

    async fn start_live_listener(&self) -> Result<bool> {
        let mut state = self.lock();
        if !state.live_available {
            return Ok(false);
        }
        state.session.live_transfer_active = true;
        Ok(true)
    }

    async fn send_live_message(&self, text: &str) -> Result<()> {
        let reply = {
            let mut state = self.lock();
            if !state.session.live_transfer_active {
                return Err(ClientError::LiveTransport("listener not connected".to_string()).into());
            }
            state.live_sent.push(text.to_string());
            state.live_reply.clone()
        };
        if let Some(reply) = reply {
            self.push_live_reply(&reply);
        }
        Ok(())
    }

    async fn end_live_session(&self) -> Result<()> {
        let mut state = self.lock();
        state.ended = true;
        state.session.live_transfer_active = false;
        state.session.transfer_requested = false;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.lock().closed = true;
        Ok(())
    }
}

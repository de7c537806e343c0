// ABOUTME: Registry of live conversations keyed by channel or conversation id.
// ABOUTME: Owns each conversation's client and lazily started bridge worker, and tears them down on end.

use crate::bridge::LazyBridge;
use anyhow::Result;
use pinion_client::{ChatMessage, ClientConfig, ClientRegistry, ConversationClient};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One conversation: its client plus the worker synchronous callers use to drive it
pub struct SessionEntry {
    id: String,
    client: Arc<dyn ConversationClient>,
    bridge: LazyBridge,
}

impl std::fmt::Debug for SessionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEntry")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl SessionEntry {
    pub fn new(id: impl Into<String>, client: Arc<dyn ConversationClient>) -> Self {
        let id = id.into();
        let bridge = LazyBridge::new(bridge_name(&id));
        Self { id, client, bridge }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client(&self) -> Arc<dyn ConversationClient> {
        Arc::clone(&self.client)
    }

    /// Worker for synchronous callers; started on first use
    pub fn bridge(&self) -> &LazyBridge {
        &self.bridge
    }

    /// Add the agent's start greeting to an empty history.
    ///
    /// Returns true when a greeting was added.
    pub fn seed_greeting(&self) -> bool {
        seed_greeting(self.client.as_ref())
    }

    /// End any live session and release the client. Failures are logged.
    pub async fn teardown(&self) {
        if let Err(e) = self.client.end_live_session().await {
            tracing::warn!(conversation_id = %self.id, error = %e, "Failed to end live session");
        }
        if let Err(e) = self.client.close().await {
            tracing::warn!(conversation_id = %self.id, error = %e, "Failed to close client");
        }
        if self.bridge.is_started() {
            if let Ok(bridge) = self.bridge.get() {
                bridge.shutdown();
            }
        }
    }
}

/// Add the start greeting when the client has no history yet
pub fn seed_greeting(client: &dyn ConversationClient) -> bool {
    if !client.messages().is_empty() {
        return false;
    }
    match client.agent_vars().start {
        Some(greeting) if !greeting.trim().is_empty() => {
            client.add_message(ChatMessage::assistant(greeting));
            true
        }
        _ => false,
    }
}

/// Thread names are limited in length on some platforms; keep them short
fn bridge_name(id: &str) -> String {
    let short: String = id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(16)
        .collect();
    if short.is_empty() {
        "session".to_string()
    } else {
        short
    }
}

/// Conversations keyed by id, created on demand from a [`ClientRegistry`].
///
/// Passed explicitly to the front-ends that need it; nothing here is global.
pub struct SessionRegistry {
    clients: Arc<ClientRegistry>,
    sessions: tokio::sync::Mutex<HashMap<String, Arc<SessionEntry>>>,
    // conversation id -> guard held while that conversation's client is created
    creating: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    // conversation id -> agent file waiting for its key secret
    pending_secrets: Mutex<HashMap<String, String>>,
}

impl SessionRegistry {
    pub fn new(clients: Arc<ClientRegistry>) -> Self {
        Self {
            clients,
            sessions: tokio::sync::Mutex::new(HashMap::new()),
            creating: Mutex::new(HashMap::new()),
            pending_secrets: Mutex::new(HashMap::new()),
        }
    }

    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.lock().await.get(id).cloned()
    }

    /// Existing conversation, or a new one built from credentials in `config`.
    ///
    /// Returns `Ok(None)` when there is no conversation and `config` has
    /// neither credentials nor an agent file to build one from. Creation is
    /// serialized per id only; other conversations stay reachable while a
    /// client is being built.
    pub async fn get_or_create(
        &self,
        id: &str,
        config: &ClientConfig,
    ) -> Result<Option<Arc<SessionEntry>>> {
        if let Some(entry) = self.get(id).await {
            return Ok(Some(entry));
        }
        if !config.has_credentials() && config.aia_source.is_none() {
            return Ok(None);
        }

        let guard = self.creation_guard(id);
        let _creating = guard.lock().await;
        if let Some(entry) = self.get(id).await {
            return Ok(Some(entry));
        }

        tracing::info!(conversation_id = %id, backend = %config.backend, "Initializing conversation client");
        let client = self.clients.create(config).await?;
        let entry = Arc::new(SessionEntry::new(id, client));
        entry.seed_greeting();

        let existing = {
            let mut sessions = self.sessions.lock().await;
            match sessions.get(id) {
                // Loaded by an upload while this client was being built
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    sessions.insert(id.to_string(), Arc::clone(&entry));
                    None
                }
            }
        };
        match existing {
            Some(existing) => {
                entry.teardown().await;
                Ok(Some(existing))
            }
            None => Ok(Some(entry)),
        }
    }

    fn creation_guard(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut creating = self.creating.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(creating.entry(id.to_string()).or_default())
    }

    /// Build a client from `config` and make it the conversation's client,
    /// tearing down whatever was there before.
    pub async fn load(&self, id: &str, config: &ClientConfig) -> Result<Arc<SessionEntry>> {
        let client = self.clients.create(config).await?;
        Ok(self.insert(id, client).await)
    }

    /// Install `client` for `id`, tearing down any previous client
    pub async fn insert(&self, id: &str, client: Arc<dyn ConversationClient>) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry::new(id, client));
        entry.seed_greeting();
        let previous = self
            .sessions
            .lock()
            .await
            .insert(id.to_string(), Arc::clone(&entry));
        if let Some(previous) = previous {
            previous.teardown().await;
        }
        entry
    }

    /// Forget a conversation without tearing it down
    pub async fn remove(&self, id: &str) -> Option<Arc<SessionEntry>> {
        let removed = self.sessions.lock().await.remove(id);
        if removed.is_some() {
            self.creating
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(id);
        }
        removed
    }

    /// Remove and tear down a conversation. Returns false if it did not exist.
    pub async fn end(&self, id: &str) -> bool {
        match self.remove(id).await {
            Some(entry) => {
                entry.teardown().await;
                tracing::info!(conversation_id = %id, "Conversation ended");
                true
            }
            None => false,
        }
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Tear down every conversation
    pub async fn shutdown_all(&self) {
        let entries: Vec<Arc<SessionEntry>> =
            self.sessions.lock().await.drain().map(|(_, e)| e).collect();
        self.creating
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        for entry in entries {
            entry.teardown().await;
        }
    }

    /// Remember an agent file that needs a key secret before it can load
    pub fn set_pending_secret(&self, id: &str, source: String) {
        self.pending_secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.to_string(), source);
    }

    /// Take the agent file waiting for a key secret, if any
    pub fn take_pending_secret(&self, id: &str) -> Option<String> {
        self.pending_secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
    }

    pub fn has_pending_secret(&self, id: &str) -> bool {
        self.pending_secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(id)
    }
}

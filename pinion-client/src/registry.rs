// ABOUTME: Registry pattern for runtime backend selection.
// ABOUTME: Backends register async factories, front-ends create clients by name from config.

use crate::client::ConversationClient;
use crate::config::ClientConfig;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function that creates a client from config
pub type ClientFactory = Box<
    dyn Fn(ClientConfig) -> BoxFuture<'static, Result<Arc<dyn ConversationClient>>> + Send + Sync,
>;

/// Registry for runtime backend selection
pub struct ClientRegistry {
    factories: HashMap<String, ClientFactory>,
}

impl ClientRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory by name
    pub fn register(mut self, name: &str, factory: ClientFactory) -> Self {
        self.factories.insert(name.to_string(), factory);
        self
    }

    /// Create a client using the backend named in `config`
    pub async fn create(&self, config: &ClientConfig) -> Result<Arc<dyn ConversationClient>> {
        let factory = self
            .factories
            .get(&config.backend)
            .ok_or_else(|| anyhow!("Unknown backend: {}", config.backend))?;
        tracing::debug!(backend = %config.backend, "Creating conversation client");
        factory(config.clone()).await
    }

    /// List available backend names
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        use crate::backends::mock::MockClient;

        Self::new().register("mock", MockClient::factory())
    }
}

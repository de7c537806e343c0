// ABOUTME: Client creation settings shared by every backend factory.
// ABOUTME: Deserialized from the [client] section of the application config.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a conversation client should be created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Registry name of the backend ("mock", ...)
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Agent definition file to load instead of credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aia_file: Option<PathBuf>,
    /// Contents of an agent definition file, filled in by the front-end
    #[serde(skip)]
    pub aia_source: Option<String>,
    /// Secret used to decrypt a private agent definition
    #[serde(skip)]
    pub key_secret: Option<String>,
}

fn default_backend() -> String {
    "mock".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            agent_id: None,
            host_url: None,
            client_id: None,
            client_secret: None,
            version: None,
            aia_file: None,
            aia_source: None,
            key_secret: None,
        }
    }
}

impl ClientConfig {
    /// True when every credential needed for an id-based client is present
    pub fn has_credentials(&self) -> bool {
        [
            &self.agent_id,
            &self.host_url,
            &self.client_id,
            &self.client_secret,
        ]
        .iter()
        .all(|v| v.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }

    /// Copy of this config that loads the given agent definition
    pub fn with_agent_source(&self, source: impl Into<String>, key_secret: Option<String>) -> Self {
        Self {
            aia_source: Some(source.into()),
            key_secret,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> ClientConfig {
        ClientConfig {
            agent_id: Some("agent".to_string()),
            host_url: Some("https://host".to_string()),
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn test_default_backend_is_mock() {
        assert_eq!(ClientConfig::default().backend, "mock");
    }

    #[test]
    fn test_has_credentials_requires_all_four() {
        assert!(with_credentials().has_credentials());

        let mut missing = with_credentials();
        missing.client_secret = None;
        assert!(!missing.has_credentials());

        let mut blank = with_credentials();
        blank.host_url = Some("  ".to_string());
        assert!(!blank.has_credentials());
    }

    #[test]
    fn test_with_agent_source_keeps_backend() {
        let config = ClientConfig {
            backend: "custom".to_string(),
            ..ClientConfig::default()
        };
        let loaded = config.with_agent_source("agent-file", Some("key".to_string()));
        assert_eq!(loaded.backend, "custom");
        assert_eq!(loaded.aia_source.as_deref(), Some("agent-file"));
        assert_eq!(loaded.key_secret.as_deref(), Some("key"));
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"agent_id": "a1"}"#).unwrap();
        assert_eq!(config.backend, "mock");
        assert_eq!(config.agent_id.as_deref(), Some("a1"));
        assert!(config.aia_source.is_none());
    }
}

// ABOUTME: Conversation client abstraction for pinion front-ends.
// ABOUTME: Provides the ConversationClient trait, a scripted mock backend, and a named-backend registry.

pub mod backends;
pub mod client;
pub mod config;
pub mod error;
pub mod registry;

pub use client::{AgentVars, ChatMessage, ConversationClient, Role, SessionState};
pub use config::ClientConfig;
pub use error::ClientError;
pub use registry::{ClientFactory, ClientRegistry};

// ABOUTME: Root library module exposing the pinion front-ends
// ABOUTME: Provides config, paths, logging, the terminal chat, and the HTTP chat gateway

pub mod config;
pub mod gateway;
pub mod logging;
pub mod paths;
pub mod terminal;

// Re-export the core types front-ends are built from
pub use pinion_client::{ClientConfig, ClientRegistry, ConversationClient};
pub use pinion_core::{ChannelHandler, PollConfig, SessionRegistry, UpdatePoller};

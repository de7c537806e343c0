// ABOUTME: Conversation client backends.
// ABOUTME: Each backend implements ConversationClient and exposes a registry factory.

pub mod mock;

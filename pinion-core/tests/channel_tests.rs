// ABOUTME: Tests for ChannelHandler message routing with mock clients.
// ABOUTME: Covers agent file uploads, key-secret prompts, /end, turns, and live-agent notices.

use pinion_client::backends::mock::MockClient;
use pinion_core::channel::{
    ENDED_REPLY, HANDOFF_REPLY, LIVE_UNAVAILABLE_REPLY, NO_AGENT_REPLY, NO_SESSION_REPLY,
    SECRET_PROMPT_REPLY,
};
use pinion_core::{
    Attachment, ChannelEvent, ChannelHandler, ClientConfig, ClientRegistry, ConversationClient,
    ManualClock, PollConfig, SessionRegistry, UpdatePoller,
};
use std::sync::Arc;

const LOADED_FROM_FILE: &str = "*Mock Agent* loaded from file.\nHello! How can I help you today?";

fn handler(client_config: ClientConfig) -> ChannelHandler {
    let sessions = Arc::new(SessionRegistry::new(Arc::new(ClientRegistry::default())));
    let poller = UpdatePoller::with_clock(PollConfig::default(), Arc::new(ManualClock::new()));
    ChannelHandler::new(sessions, client_config, poller)
}

fn credentials() -> ClientConfig {
    ClientConfig {
        agent_id: Some("agent-1".to_string()),
        host_url: Some("https://agents.example.com".to_string()),
        client_id: Some("client".to_string()),
        client_secret: Some("secret".to_string()),
        ..ClientConfig::default()
    }
}

fn upload(name: &str, content: &str) -> ChannelEvent {
    ChannelEvent {
        text: String::new(),
        attachments: vec![Attachment {
            name: name.to_string(),
            content: content.to_string(),
        }],
    }
}

/// Handler with a scripted mock already installed for `id`
async fn handler_with(id: &str, mock: &MockClient) -> ChannelHandler {
    let handler = handler(ClientConfig::default());
    handler.sessions().insert(id, mock.clone().into_client()).await;
    handler
}

#[tokio::test]
async fn test_no_agent_configured() {
    let handler = handler(ClientConfig::default());
    let replies = handler.handle("C1", ChannelEvent::text("hello")).await;
    assert_eq!(replies, vec![NO_AGENT_REPLY]);
    assert!(handler.sessions().is_empty().await);
}

#[tokio::test]
async fn test_credentials_create_session_on_first_message() {
    let handler = handler(credentials());

    let replies = handler.handle("C1", ChannelEvent::text("hello")).await;

    assert_eq!(replies, vec!["Mock: no expectation for 'hello'"]);
    assert_eq!(handler.sessions().ids().await, vec!["C1"]);
}

#[tokio::test]
async fn test_unknown_backend_is_reported_as_no_agent() {
    let handler = handler(ClientConfig {
        backend: "missing".to_string(),
        ..credentials()
    });
    let replies = handler.handle("C1", ChannelEvent::text("hello")).await;
    assert_eq!(replies, vec![NO_AGENT_REPLY]);
}

#[tokio::test]
async fn test_empty_message_is_ignored() {
    let handler = handler(credentials());
    assert!(handler.handle("C1", ChannelEvent::text("   ")).await.is_empty());
    assert!(handler.sessions().is_empty().await);
}

#[tokio::test]
async fn test_link_markup_is_cleaned_before_the_agent_sees_it() {
    let mock = MockClient::new()
        .on_input("mail alan@example.com")
        .respond_text("Noted your email.");
    let handler = handler_with("C1", &mock).await;

    let replies = handler
        .handle(
            "C1",
            ChannelEvent::text("mail <mailto:alan@example.com|alan@example.com>"),
        )
        .await;

    assert_eq!(replies, vec!["Noted your email."]);
}

#[tokio::test]
async fn test_end_command() {
    let mock = MockClient::new();
    let handler = handler_with("C1", &mock).await;

    assert_eq!(handler.handle("C1", ChannelEvent::text("/END")).await, vec![ENDED_REPLY]);
    assert!(mock.ended());
    assert!(mock.closed());

    assert_eq!(
        handler.handle("C1", ChannelEvent::text("!end")).await,
        vec![NO_SESSION_REPLY]
    );
}

#[tokio::test]
async fn test_public_agent_file_loads() {
    let handler = handler(ClientConfig::default());

    let replies = handler.handle("C1", upload("support.AIA", "name: support")).await;

    assert_eq!(replies, vec![LOADED_FROM_FILE]);
    let entry = handler.sessions().get("C1").await.unwrap();
    assert_eq!(entry.client().messages().len(), 1);
}

#[tokio::test]
async fn test_non_agent_attachment_is_ignored() {
    let handler = handler(ClientConfig::default());
    let event = ChannelEvent {
        text: String::new(),
        attachments: vec![Attachment {
            name: "notes.txt".to_string(),
            content: "hello".to_string(),
        }],
    };
    assert!(handler.handle("C1", event).await.is_empty());
}

#[tokio::test]
async fn test_private_agent_file_asks_for_secret() {
    let handler = handler(ClientConfig::default());

    let replies = handler
        .handle("C1", upload("vault.aia", "private:open-sesame\nname: vault"))
        .await;
    assert_eq!(replies, vec![SECRET_PROMPT_REPLY]);
    assert!(handler.sessions().has_pending_secret("C1"));

    let replies = handler.handle("C1", ChannelEvent::text("open-sesame")).await;
    assert_eq!(
        replies,
        vec![
            "Decrypting and loading agent...",
            "*Mock Agent* loaded.\nHello! How can I help you today?"
        ]
    );
    assert!(!handler.sessions().has_pending_secret("C1"));
    assert!(handler.sessions().get("C1").await.is_some());
}

#[tokio::test]
async fn test_wrong_secret_fails_and_clears_pending_state() {
    let handler = handler(ClientConfig::default());
    handler
        .handle("C1", upload("vault.aia", "private:open-sesame"))
        .await;

    let replies = handler.handle("C1", ChannelEvent::text("guess")).await;

    assert_eq!(replies[0], "Decrypting and loading agent...");
    assert!(replies[1].starts_with("Failed to load agent:"));
    assert!(replies[1].contains("invalid key_secret"));
    assert!(!handler.sessions().has_pending_secret("C1"));
    assert!(handler.sessions().get("C1").await.is_none());
}

#[tokio::test]
async fn test_new_agent_file_replaces_existing_session() {
    let mock = MockClient::new();
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", upload("new.aia", "name: new")).await;

    assert_eq!(replies, vec![LOADED_FROM_FILE]);
    assert!(mock.closed());
}

#[tokio::test]
async fn test_handoff_notices() {
    let mock = MockClient::new()
        .on_input("human")
        .respond_with_transfer("Connecting you now.");
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", ChannelEvent::text("human please")).await;

    assert_eq!(
        replies,
        vec![
            "Connecting you now.",
            HANDOFF_REPLY,
            "No new messages in the last 3 minutes. Send another message or /end."
        ]
    );
}

#[tokio::test]
async fn test_operator_reply_during_handoff_follows_transfer_notice() {
    let mock = MockClient::new()
        .on_input("human")
        .respond_with_transfer("Connecting you now.");
    let handler = handler_with("C1", &mock).await;

    // The operator answers once the live listener is up
    let operator = mock.clone();
    tokio::spawn(async move {
        while !operator.state().live_transfer_active {
            tokio::task::yield_now().await;
        }
        operator.push_live_reply("Operator: hi");
    });

    let replies = handler.handle("C1", ChannelEvent::text("human please")).await;

    assert_eq!(
        replies,
        vec!["Connecting you now.", HANDOFF_REPLY, "Operator: hi"]
    );
}

#[tokio::test]
async fn test_handoff_without_live_service_skips_transfer_notice() {
    let mock = MockClient::new()
        .live_unavailable()
        .on_input("human")
        .respond_with_transfer("Connecting you now.");
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", ChannelEvent::text("human please")).await;

    assert_eq!(replies, vec!["Connecting you now.", LIVE_UNAVAILABLE_REPLY]);
}

#[tokio::test]
async fn test_live_reply_is_posted() {
    let mock = MockClient::new()
        .with_transfer_requested()
        .with_live_reply("Operator: I can help with that.");
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", ChannelEvent::text("refund please")).await;

    assert_eq!(replies, vec!["Operator: I can help with that."]);
    assert_eq!(mock.live_messages(), vec!["refund please"]);
}

#[tokio::test]
async fn test_live_service_unavailable() {
    let mock = MockClient::new().with_transfer_requested().live_unavailable();
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", ChannelEvent::text("hello")).await;

    assert_eq!(replies, vec![LIVE_UNAVAILABLE_REPLY]);
}

#[tokio::test]
async fn test_agent_error_is_reported() {
    let mock = MockClient::new().on_input("crash").respond_error("agent offline");
    let handler = handler_with("C1", &mock).await;

    let replies = handler.handle("C1", ChannelEvent::text("crash")).await;

    assert_eq!(replies, vec!["Agent Error: backend error: agent offline"]);
}

#[tokio::test]
async fn test_channels_are_isolated() {
    let first = MockClient::new().on_input("hi").respond_text("first agent");
    let handler = handler_with("C1", &first).await;
    let second = MockClient::new().on_input("hi").respond_text("second agent");
    handler.sessions().insert("C2", second.into_client()).await;

    assert_eq!(handler.handle("C2", ChannelEvent::text("hi")).await, vec!["second agent"]);
    assert_eq!(handler.handle("C1", ChannelEvent::text("hi")).await, vec!["first agent"]);
}

// ABOUTME: Tests for the shared conversation turn logic using the mock client.
// ABOUTME: Covers AI replies, follow-up intents, live-agent handoff, and live messaging.

use pinion_client::backends::mock::MockClient;
use pinion_core::{
    Conversation, HandoffStatus, ManualClock, PollConfig, Role, TurnOutcome, UpdatePoller,
};
use std::sync::Arc;
use std::time::Duration;

fn start(mock: &MockClient) -> (Conversation, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let poller = UpdatePoller::with_clock(PollConfig::default(), clock.clone());
    (Conversation::new(mock.clone().into_client(), poller), clock)
}

#[tokio::test]
async fn test_plain_reply() {
    let mock = MockClient::new().on_input("hello").respond_text("Hi there!");
    let (conversation, _clock) = start(&mock);

    let outcome = conversation.send("hello").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            replies: vec!["Hi there!".to_string()],
            handoff: None,
        }
    );
    let history = conversation.client().messages();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(mock.updates(), 1);
}

#[tokio::test]
async fn test_follow_up_intent_runs_second_step() {
    let mock = MockClient::new()
        .on_input("order")
        .respond_with_intent("Let me check that order.", "order_lookup")
        .on_input("order")
        .respond_text("Order 42 shipped yesterday.");
    let (conversation, _clock) = start(&mock);

    let outcome = conversation.send("where is my order").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            replies: vec![
                "Let me check that order.".to_string(),
                "Order 42 shipped yesterday.".to_string()
            ],
            handoff: None,
        }
    );
    assert_eq!(mock.updates(), 2);
    assert!(conversation.client().state().next_intent.is_none());
}

#[tokio::test]
async fn test_handoff_waits_for_operator_then_times_out() {
    let mock = MockClient::new()
        .on_input("human")
        .respond_with_transfer("Connecting you to a person.");
    let (conversation, clock) = start(&mock);

    let outcome = conversation.send("talk to a human").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            replies: vec!["Connecting you to a person.".to_string()],
            handoff: Some(HandoffStatus::TimedOut),
        }
    );
    assert!(conversation.client().state().live_transfer_active);
    assert_eq!(clock.elapsed(), Duration::from_secs(180));
}

#[tokio::test]
async fn test_handoff_reports_unavailable_service() {
    let mock = MockClient::new()
        .live_unavailable()
        .on_input("human")
        .respond_with_transfer("Connecting you to a person.");
    let (conversation, clock) = start(&mock);

    let outcome = conversation.send("human please").await.unwrap();

    assert_eq!(
        outcome,
        TurnOutcome::Replied {
            replies: vec!["Connecting you to a person.".to_string()],
            handoff: Some(HandoffStatus::Unavailable),
        }
    );
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn test_live_message_goes_to_operator() {
    let mock = MockClient::new()
        .with_transfer_requested()
        .with_live_reply("Operator: how can I help?");
    let (conversation, _clock) = start(&mock);

    let outcome = conversation.send("my card was charged twice").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Live(HandoffStatus::Updated));
    assert_eq!(mock.live_messages(), vec!["my card was charged twice"]);
    let last = conversation.client().messages().pop().unwrap();
    assert_eq!(last.content, "Operator: how can I help?");
    assert_eq!(mock.marker_checks(), 0);
}

#[tokio::test]
async fn test_live_message_without_answer_times_out() {
    let mock = MockClient::new().with_transfer_requested();
    let (conversation, clock) = start(&mock);

    let outcome = conversation.send("anyone there?").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Live(HandoffStatus::TimedOut));
    assert_eq!(clock.elapsed(), Duration::from_secs(180));
    assert!(mock.marker_checks() > 0);
}

#[tokio::test]
async fn test_live_message_with_service_down() {
    let mock = MockClient::new().with_transfer_requested().live_unavailable();
    let (conversation, _clock) = start(&mock);

    let outcome = conversation.send("hello?").await.unwrap();

    assert_eq!(outcome, TurnOutcome::Live(HandoffStatus::Unavailable));
    assert!(mock.live_messages().is_empty());
}

#[tokio::test]
async fn test_backend_error_propagates() {
    let mock = MockClient::new()
        .on_input("break")
        .respond_error("service unavailable");
    let (conversation, _clock) = start(&mock);

    let err = conversation.send("break things").await.unwrap_err();
    assert!(err.to_string().contains("service unavailable"));
}

#[tokio::test]
async fn test_continue_waiting_uses_short_wait() {
    let mock = MockClient::new();
    let (conversation, clock) = start(&mock);

    assert!(!conversation.continue_waiting().await);
    assert_eq!(clock.elapsed(), Duration::from_secs(5));

    mock.push_live_reply("back now");
    let (conversation, _clock) = start(&mock);
    assert!(conversation.continue_waiting().await);
}

#[tokio::test]
async fn test_end_clears_live_state() {
    let mock = MockClient::new().with_transfer_requested();
    let (conversation, _clock) = start(&mock);
    assert!(conversation.ensure_live_listener().await);

    conversation.end().await.unwrap();

    let state = conversation.client().state();
    assert!(!state.live_transfer_active);
    assert!(!state.transfer_requested);
    assert!(mock.ended());
}

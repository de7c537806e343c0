// ABOUTME: Freshness oracles answer "has the conversation changed?" for the update poller.
// ABOUTME: LiveUpdateOracle reads the push-style timestamp; ServerMarkerOracle asks the server.

use anyhow::Result;
use async_trait::async_trait;
use pinion_client::ConversationClient;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A single way of detecting new conversation content
#[async_trait]
pub trait FreshnessOracle: Send + Sync {
    /// Oracle name for logging
    fn name(&self) -> &'static str;

    /// True when new content exists as of `now`
    async fn check(&self, now: Instant) -> Result<bool>;
}

/// Fast path: the live transport stamps the session whenever it receives data.
pub struct LiveUpdateOracle {
    client: Arc<dyn ConversationClient>,
    window: Duration,
}

impl LiveUpdateOracle {
    pub fn new(client: Arc<dyn ConversationClient>, window: Duration) -> Self {
        Self { client, window }
    }
}

#[async_trait]
impl FreshnessOracle for LiveUpdateOracle {
    fn name(&self) -> &'static str {
        "live_update"
    }

    async fn check(&self, now: Instant) -> Result<bool> {
        Ok(is_recent(self.client.state().last_live_update, now, self.window))
    }
}

/// Slow path: fetch the server's modification marker and compare it with the
/// last marker the session observed.
pub struct ServerMarkerOracle {
    client: Arc<dyn ConversationClient>,
}

impl ServerMarkerOracle {
    pub fn new(client: Arc<dyn ConversationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FreshnessOracle for ServerMarkerOracle {
    fn name(&self) -> &'static str {
        "server_marker"
    }

    async fn check(&self, _now: Instant) -> Result<bool> {
        let (marker, _metadata) = self.client.fetch_server_marker().await?;
        let known = self.client.state().last_known_marker;
        Ok(marker_changed(marker.as_deref(), known.as_deref()))
    }
}

/// True when `last` lies less than `window` before `now`.
///
/// A timestamp ahead of `now` counts as recent.
pub fn is_recent(last: Option<Instant>, now: Instant, window: Duration) -> bool {
    last.is_some_and(|at| now.saturating_duration_since(at) < window)
}

/// True when the server reported a non-empty marker that differs from the known one
pub fn marker_changed(server: Option<&str>, known: Option<&str>) -> bool {
    match server {
        Some(marker) if !marker.is_empty() => Some(marker) != known,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pinion_client::backends::mock::MockClient;

    #[test]
    fn test_is_recent_window() {
        let now = Instant::now();
        let window = Duration::from_secs(2);
        assert!(!is_recent(None, now, window));
        assert!(is_recent(Some(now), now, window));
        assert!(is_recent(Some(now + Duration::from_secs(1)), now, window));

        let later = now + Duration::from_millis(1999);
        assert!(is_recent(Some(now), later, window));
        let expired = now + Duration::from_secs(2);
        assert!(!is_recent(Some(now), expired, window));
    }

    #[test]
    fn test_marker_changed() {
        assert!(!marker_changed(None, Some("a")));
        assert!(!marker_changed(Some(""), Some("a")));
        assert!(!marker_changed(Some("a"), Some("a")));
        assert!(marker_changed(Some("b"), Some("a")));
        assert!(marker_changed(Some("b"), None));
    }

    #[tokio::test]
    async fn test_live_update_oracle_reads_session_timestamp() {
        let mock = MockClient::new();
        let oracle = LiveUpdateOracle::new(mock.clone().into_client(), Duration::from_secs(2));

        assert!(!oracle.check(Instant::now()).await.unwrap());
        mock.push_live_reply("operator here");
        assert!(oracle.check(Instant::now()).await.unwrap());
    }

    #[tokio::test]
    async fn test_server_marker_oracle_detects_external_change() {
        let mock = MockClient::new();
        let client = mock.clone().into_client();
        client.update_session().await.unwrap();
        let oracle = ServerMarkerOracle::new(client);

        assert!(!oracle.check(Instant::now()).await.unwrap());
        mock.set_server_marker("changed-by-operator");
        assert!(oracle.check(Instant::now()).await.unwrap());
        assert_eq!(mock.marker_checks(), 2);
    }

    #[tokio::test]
    async fn test_server_marker_oracle_propagates_errors() {
        let mock = MockClient::new();
        mock.fail_marker_checks(1);
        let oracle = ServerMarkerOracle::new(mock.into_client());
        assert!(oracle.check(Instant::now()).await.is_err());
    }
}

// ABOUTME: UpdatePoller decides within a time budget whether a conversation has new content.
// ABOUTME: Checks the fast live-update signal every tick and the slow server marker on a schedule.

use crate::bridge::{BridgeError, EventLoopBridge};
use crate::clock::{Clock, SystemClock};
use crate::config::PollConfig;
use crate::freshness::{FreshnessOracle, LiveUpdateOracle, ServerMarkerOracle};
use pinion_client::ConversationClient;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polls a pair of freshness oracles until one reports news or time runs out.
///
/// Cloning is cheap; clones share the clock.
#[derive(Clone)]
pub struct UpdatePoller {
    config: PollConfig,
    clock: Arc<dyn Clock>,
}

/// When the next networked check is allowed, relative to the poll start
#[derive(Debug)]
struct PollSchedule {
    started: Instant,
    timeout: Duration,
    /// `None` when the next check lies beyond what `Instant` can represent
    next_fallback: Option<Instant>,
    interval: Duration,
}

impl PollSchedule {
    fn new(started: Instant, timeout: Duration, config: &PollConfig) -> Self {
        Self {
            started,
            timeout,
            next_fallback: started.checked_add(config.initial_fallback_delay()),
            interval: config.fallback_interval(),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.timeout
    }

    fn fallback_due(&self, now: Instant) -> bool {
        self.next_fallback.is_some_and(|next| now >= next)
    }

    /// Success and failure both wait a full interval before the next check
    fn reschedule(&mut self, now: Instant) {
        self.next_fallback = now.checked_add(self.interval);
    }
}

impl UpdatePoller {
    /// Poller on wall-clock time
    pub fn new(config: PollConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: PollConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `fast` every tick and `slow` on the fallback schedule.
    ///
    /// Returns `true` as soon as either oracle reports fresh content and
    /// `false` once `timeout` has elapsed. A zero timeout returns `false`
    /// without consulting either oracle. Errors from `slow` are logged and
    /// count as "no update this round". An in-flight slow check is not
    /// cancelled, so one straggling call can overrun the budget.
    pub async fn poll(
        &self,
        fast: &dyn FreshnessOracle,
        slow: &dyn FreshnessOracle,
        timeout: Duration,
    ) -> bool {
        let mut schedule = PollSchedule::new(self.clock.now(), timeout, &self.config);

        loop {
            let now = self.clock.now();
            if schedule.expired(now) {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Poll timed out");
                return false;
            }

            match fast.check(now).await {
                Ok(true) => {
                    tracing::debug!(oracle = fast.name(), "Fresh content detected");
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!(oracle = fast.name(), error = %e, "Fast freshness check failed");
                }
            }

            let now = self.clock.now();
            if schedule.fallback_due(now) {
                match slow.check(now).await {
                    Ok(true) => {
                        tracing::debug!(oracle = slow.name(), "Fresh content detected");
                        return true;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            oracle = slow.name(),
                            error = %e,
                            "Could not check for session updates"
                        );
                    }
                }
                schedule.reschedule(now);
            }

            self.clock.sleep(self.config.tick()).await;
        }
    }

    /// Poll a conversation client with the standard oracle pair
    pub async fn poll_client(&self, client: Arc<dyn ConversationClient>, timeout: Duration) -> bool {
        let fast = LiveUpdateOracle::new(Arc::clone(&client), self.config.fast_path_window());
        let slow = ServerMarkerOracle::new(client);
        self.poll(&fast, &slow, timeout).await
    }

    /// Run [`poll_client`](Self::poll_client) on a bridge worker from synchronous code.
    ///
    /// The caller thread blocks; the poll's sleeps yield on the worker, so
    /// other operations there (such as the live transport) keep running.
    pub fn poll_client_blocking(
        &self,
        bridge: &EventLoopBridge,
        client: Arc<dyn ConversationClient>,
        timeout: Duration,
    ) -> Result<bool, BridgeError> {
        let poller = self.clone();
        bridge.block_on(async move { poller.poll_client(client, timeout).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_first_fallback_after_initial_delay() {
        let start = Instant::now();
        let schedule = PollSchedule::new(start, Duration::from_secs(60), &PollConfig::default());
        assert!(!schedule.fallback_due(start + Duration::from_secs(29)));
        assert!(schedule.fallback_due(start + Duration::from_secs(30)));
    }

    #[test]
    fn test_schedule_reschedules_from_check_time() {
        let start = Instant::now();
        let mut schedule =
            PollSchedule::new(start, Duration::from_secs(60), &PollConfig::default());
        let checked_at = start + Duration::from_secs(31);
        schedule.reschedule(checked_at);
        assert!(!schedule.fallback_due(checked_at + Duration::from_millis(4999)));
        assert!(schedule.fallback_due(checked_at + Duration::from_secs(5)));
    }

    #[test]
    fn test_schedule_expiry_is_exclusive_of_deadline() {
        let start = Instant::now();
        let schedule = PollSchedule::new(start, Duration::from_secs(1), &PollConfig::default());
        assert!(!schedule.expired(start + Duration::from_millis(999)));
        assert!(schedule.expired(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_schedule_with_unreachable_fallback_never_fires() {
        let start = Instant::now();
        let config = PollConfig {
            initial_fallback_delay_secs: u64::MAX,
            ..PollConfig::default()
        };
        let schedule = PollSchedule::new(start, Duration::from_secs(60), &config);
        assert!(!schedule.fallback_due(start + Duration::from_secs(59)));
    }
}

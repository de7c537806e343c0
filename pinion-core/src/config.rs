// ABOUTME: Tunable timings for update polling and live-agent waits
// ABOUTME: Deserialized from the [poller] section with defaults matching the stock front-ends

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for every configured wait (one week)
pub const MAX_WAIT_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// A live update younger than this counts as fresh
    #[serde(default = "default_fast_path_window_secs")]
    pub fast_path_window_secs: f64,
    /// Grace period before the first networked freshness check
    #[serde(default = "default_initial_fallback_delay_secs")]
    pub initial_fallback_delay_secs: u64,
    /// Minimum spacing between networked freshness checks
    #[serde(default = "default_fallback_interval_secs")]
    pub fallback_interval_secs: u64,
    /// Sleep between poll iterations
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// How long to wait for the operator after a live message or handoff
    #[serde(default = "default_live_wait_secs")]
    pub live_wait_secs: u64,
    /// How long an explicit "continue" waits for news
    #[serde(default = "default_continue_wait_secs")]
    pub continue_wait_secs: u64,
}

fn default_fast_path_window_secs() -> f64 {
    2.0
}

fn default_initial_fallback_delay_secs() -> u64 {
    30
}

fn default_fallback_interval_secs() -> u64 {
    5
}

fn default_tick_millis() -> u64 {
    100
}

fn default_live_wait_secs() -> u64 {
    180
}

fn default_continue_wait_secs() -> u64 {
    5
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            fast_path_window_secs: default_fast_path_window_secs(),
            initial_fallback_delay_secs: default_initial_fallback_delay_secs(),
            fallback_interval_secs: default_fallback_interval_secs(),
            tick_millis: default_tick_millis(),
            live_wait_secs: default_live_wait_secs(),
            continue_wait_secs: default_continue_wait_secs(),
        }
    }
}

impl PollConfig {
    /// Out-of-range windows saturate instead of panicking
    pub fn fast_path_window(&self) -> Duration {
        Duration::try_from_secs_f64(self.fast_path_window_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn initial_fallback_delay(&self) -> Duration {
        Duration::from_secs(self.initial_fallback_delay_secs)
    }

    pub fn fallback_interval(&self) -> Duration {
        Duration::from_secs(self.fallback_interval_secs)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }

    pub fn live_wait(&self) -> Duration {
        Duration::from_secs(self.live_wait_secs)
    }

    pub fn continue_wait(&self) -> Duration {
        Duration::from_secs(self.continue_wait_secs)
    }

    /// Reject settings that would spin the poll loop or never fire
    pub fn validate(&self) -> Result<()> {
        if !self.fast_path_window_secs.is_finite()
            || self.fast_path_window_secs < 0.0
            || self.fast_path_window_secs > MAX_WAIT_SECS as f64
        {
            anyhow::bail!(
                "poller.fast_path_window_secs must be between 0 and {}, got: {}",
                MAX_WAIT_SECS,
                self.fast_path_window_secs
            );
        }
        for (name, secs) in [
            ("initial_fallback_delay_secs", self.initial_fallback_delay_secs),
            ("fallback_interval_secs", self.fallback_interval_secs),
            ("live_wait_secs", self.live_wait_secs),
            ("continue_wait_secs", self.continue_wait_secs),
        ] {
            if secs > MAX_WAIT_SECS {
                anyhow::bail!("poller.{} must be at most {}, got: {}", name, MAX_WAIT_SECS, secs);
            }
        }
        if self.tick_millis > MAX_WAIT_SECS * 1000 {
            anyhow::bail!(
                "poller.tick_millis must be at most {}, got: {}",
                MAX_WAIT_SECS * 1000,
                self.tick_millis
            );
        }
        if self.tick_millis == 0 {
            anyhow::bail!("poller.tick_millis must be greater than zero");
        }
        if self.fallback_interval_secs == 0 {
            anyhow::bail!("poller.fallback_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

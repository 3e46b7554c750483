//! Hub configuration

use std::str::FromStr;
use std::time::Duration;

/// What a subscriber receives at the moment it joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubscribePolicy {
    /// Queue the current reading (if any) before any later broadcast
    #[default]
    ReplayLatest,
    /// Only readings ingested after the subscriber joined
    FutureOnly,
}

impl FromStr for SubscribePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replay-latest" | "replay_latest" => Ok(SubscribePolicy::ReplayLatest),
            "future-only" | "future_only" => Ok(SubscribePolicy::FutureOnly),
            other => Err(format!(
                "unknown subscribe policy '{}', expected 'replay-latest' or 'future-only'",
                other
            )),
        }
    }
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Frames buffered per subscriber before sends start to wait
    pub subscriber_buffer: usize,

    /// How long a single send may wait on a full buffer before the
    /// subscriber is treated as dead
    pub send_timeout: Duration,

    /// Subscribe-time delivery policy
    pub subscribe_policy: SubscribePolicy,

    /// Interval of the background sweep for closed subscribers
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 16,
            send_timeout: Duration::from_secs(2),
            subscribe_policy: SubscribePolicy::default(),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl HubConfig {
    /// Set the per-subscriber buffer size (minimum 1)
    pub fn subscriber_buffer(mut self, size: usize) -> Self {
        self.subscriber_buffer = size.max(1);
        self
    }

    /// Set the per-send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    /// Set the subscribe-time policy
    pub fn subscribe_policy(mut self, policy: SubscribePolicy) -> Self {
        self.subscribe_policy = policy;
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

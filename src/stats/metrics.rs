//! Statistics for the relay hub

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Live hub counters
///
/// Lock-free; updated from the ingest path and subscriber lifecycles.
#[derive(Debug)]
pub struct HubStats {
    started_at: Instant,
    readings_ingested: AtomicU64,
    frames_delivered: AtomicU64,
    subscribers_pruned: AtomicU64,
    total_subscribed: AtomicU64,
    total_unsubscribed: AtomicU64,
}

impl HubStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            readings_ingested: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            subscribers_pruned: AtomicU64::new(0),
            total_subscribed: AtomicU64::new(0),
            total_unsubscribed: AtomicU64::new(0),
        }
    }

    pub(crate) fn on_ingest(&self, delivered: u64, pruned: u64) {
        self.readings_ingested.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered.fetch_add(delivered, Ordering::Relaxed);
        self.subscribers_pruned.fetch_add(pruned, Ordering::Relaxed);
    }

    pub(crate) fn on_pruned(&self, count: u64) {
        self.subscribers_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn on_subscribe(&self) {
        self.total_subscribed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_unsubscribe(&self) {
        self.total_unsubscribed.fetch_add(1, Ordering::Relaxed);
    }

    /// Time since the hub was created
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Copy the counters out
    pub fn snapshot(&self, active_subscribers: usize) -> HubStatsSnapshot {
        HubStatsSnapshot {
            readings_ingested: self.readings_ingested.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            subscribers_pruned: self.subscribers_pruned.load(Ordering::Relaxed),
            total_subscribed: self.total_subscribed.load(Ordering::Relaxed),
            total_unsubscribed: self.total_unsubscribed.load(Ordering::Relaxed),
            active_subscribers,
            uptime_secs: self.uptime().as_secs(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`HubStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatsSnapshot {
    /// Readings accepted by the hub
    pub readings_ingested: u64,
    /// Successful per-subscriber deliveries
    pub frames_delivered: u64,
    /// Subscribers removed after a failed send or by the sweep
    pub subscribers_pruned: u64,
    /// Subscribers ever registered
    pub total_subscribed: u64,
    /// Explicit unsubscribes
    pub total_unsubscribed: u64,
    /// Currently registered subscribers
    pub active_subscribers: usize,
    pub uptime_secs: u64,
}

impl HubStatsSnapshot {
    /// Average deliveries per ingested reading
    pub fn fanout_ratio(&self) -> f64 {
        if self.readings_ingested > 0 {
            self.frames_delivered as f64 / self.readings_ingested as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = HubStats::new();
        let snap = stats.snapshot(0);

        assert_eq!(snap.readings_ingested, 0);
        assert_eq!(snap.frames_delivered, 0);
        assert_eq!(snap.subscribers_pruned, 0);
        assert_eq!(snap.total_subscribed, 0);
        assert_eq!(snap.total_unsubscribed, 0);
        assert_eq!(snap.active_subscribers, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let stats = HubStats::new();
        stats.on_subscribe();
        stats.on_subscribe();
        stats.on_ingest(2, 0);
        stats.on_ingest(1, 1);
        stats.on_pruned(1);
        stats.on_unsubscribe();

        let snap = stats.snapshot(0);
        assert_eq!(snap.readings_ingested, 2);
        assert_eq!(snap.frames_delivered, 3);
        assert_eq!(snap.subscribers_pruned, 2);
        assert_eq!(snap.total_subscribed, 2);
        assert_eq!(snap.total_unsubscribed, 1);
    }

    #[test]
    fn test_fanout_ratio() {
        let snap = HubStatsSnapshot {
            readings_ingested: 4,
            frames_delivered: 10,
            ..Default::default()
        };
        assert!((snap.fanout_ratio() - 2.5).abs() < f64::EPSILON);

        assert_eq!(HubStatsSnapshot::default().fanout_ratio(), 0.0);
    }
}

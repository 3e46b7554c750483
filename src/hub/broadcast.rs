//! Broadcast hub implementation
//!
//! The hub owns the reading store and the subscriber registry. Every ingested
//! reading replaces the stored one and is pushed to each subscriber that was
//! registered at broadcast time. Subscribers whose send fails are removed;
//! nothing is retried, the next reading carries fresh state anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use super::config::{HubConfig, SubscribePolicy};
use super::error::HubError;
use super::reading::{Reading, ReadingFrame};
use super::snapshot::SnapshotAccessor;
use super::store::ReadingStore;
use super::subscriber::{Subscriber, SubscriberId, SubscriberRegistry, Subscription};
use crate::stats::{HubStats, HubStatsSnapshot};

/// Lifecycle of the hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubState {
    /// No reading received yet
    Idle,
    /// At least one reading received; terminal until restart
    Active,
}

/// Outcome of one broadcast round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Subscribers that accepted the frame
    pub delivered: usize,
    /// Subscribers removed because their send failed
    pub pruned: Vec<SubscriberId>,
}

/// Real-time relay hub
///
/// Thread-safe; share it behind an `Arc`. Ingests are serialized so the
/// order subscribers observe matches the order the store was written.
pub struct BroadcastHub {
    store: Arc<ReadingStore>,
    subscribers: SubscriberRegistry,
    stats: HubStats,
    next_subscriber_id: AtomicU64,
    ingest_lock: Mutex<()>,
    config: HubConfig,
}

impl BroadcastHub {
    /// Create a hub with default configuration
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a hub with custom configuration
    pub fn with_config(config: HubConfig) -> Self {
        Self {
            store: Arc::new(ReadingStore::new()),
            subscribers: SubscriberRegistry::new(),
            stats: HubStats::new(),
            next_subscriber_id: AtomicU64::new(1),
            ingest_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn state(&self) -> HubState {
        if self.store.is_empty() {
            HubState::Idle
        } else {
            HubState::Active
        }
    }

    /// Read-only handle for consumers outside the broadcast path
    pub fn snapshots(&self) -> SnapshotAccessor {
        SnapshotAccessor::new(Arc::clone(&self.store))
    }

    /// Store a reading and push it to every registered subscriber
    ///
    /// Sends run concurrently, each bounded by `send_timeout`. A failed send
    /// only affects its own subscriber, which is removed from the registry.
    pub async fn ingest(&self, reading: Reading) -> Result<IngestReport, HubError> {
        let reading = Arc::new(reading);
        let frame = ReadingFrame::encode(Arc::clone(&reading))?;

        let _guard = self.ingest_lock.lock().await;

        let first = self.store.is_empty();
        self.store.replace(reading);
        if first {
            tracing::info!(
                temperature = %frame.reading.temperature,
                "First reading received, hub active"
            );
        }

        let targets = self.subscribers.snapshot().await;
        if targets.is_empty() {
            self.stats.on_ingest(0, 0);
            return Ok(IngestReport::default());
        }

        let timeout = self.config.send_timeout;
        let results = join_all(targets.iter().map(|subscriber| {
            let frame = frame.clone();
            async move { (subscriber, subscriber.deliver(frame, timeout).await) }
        }))
        .await;

        let mut report = IngestReport::default();
        for (subscriber, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    // Someone may have unsubscribed it concurrently
                    if self.subscribers.remove(subscriber.id()).await.is_some() {
                        tracing::debug!(
                            subscriber = %subscriber.id(),
                            peer = subscriber.peer(),
                            error = %e,
                            "Subscriber pruned after failed send"
                        );
                        report.pruned.push(subscriber.id());
                    }
                }
            }
        }

        self.stats
            .on_ingest(report.delivered as u64, report.pruned.len() as u64);

        tracing::trace!(
            delivered = report.delivered,
            pruned = report.pruned.len(),
            "Reading broadcast"
        );

        Ok(report)
    }

    /// Register a new subscriber
    ///
    /// With [`SubscribePolicy::ReplayLatest`] the current reading is queued
    /// before the subscriber becomes visible to broadcasts, so it arrives
    /// exactly once and ahead of any later reading.
    pub async fn subscribe(&self, peer: impl Into<String>) -> Result<Subscription, HubError> {
        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let (subscriber, subscription) =
            Subscriber::channel(id, peer, self.config.subscriber_buffer);

        let _guard = self.ingest_lock.lock().await;

        if self.config.subscribe_policy == SubscribePolicy::ReplayLatest {
            if let Some(current) = self.store.current() {
                // Fresh channel with capacity >= 1, so this cannot be full
                if let Err(e) = subscriber.try_deliver(ReadingFrame::encode(current)?) {
                    tracing::debug!(subscriber = %id, error = %e, "Replay not queued");
                }
            }
        }

        let peer = subscriber.peer().to_string();
        self.subscribers.add(subscriber).await?;
        self.stats.on_subscribe();

        let subscribers = self.subscribers.len().await;
        tracing::info!(subscriber = %id, peer = %peer, subscribers, "Subscriber added");

        Ok(subscription)
    }

    /// Deregister a subscriber; calling it twice is a no-op
    pub async fn unsubscribe(&self, id: SubscriberId) -> bool {
        match self.subscribers.remove(id).await {
            Some(subscriber) => {
                self.stats.on_unsubscribe();
                let subscribers = self.subscribers.len().await;
                tracing::info!(
                    subscriber = %id,
                    peer = subscriber.peer(),
                    subscribers,
                    "Subscriber removed"
                );
                true
            }
            None => false,
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.len().await
    }

    pub async fn is_subscribed(&self, id: SubscriberId) -> bool {
        self.subscribers.contains(id).await
    }

    pub async fn stats(&self) -> HubStatsSnapshot {
        self.stats.snapshot(self.subscribers.len().await)
    }

    /// Remove subscribers whose receivers were dropped since the last ingest
    pub async fn sweep(&self) -> Vec<SubscriberId> {
        let pruned = self.subscribers.prune_closed().await;

        if !pruned.is_empty() {
            self.stats.on_pruned(pruned.len() as u64);
            tracing::debug!(pruned = pruned.len(), "Swept closed subscribers");
        }

        pruned
    }

    /// Spawn the background sweep task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_sweep_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let hub = Arc::clone(self);
        let interval = hub.config.sweep_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                hub.sweep().await;
            }
        })
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

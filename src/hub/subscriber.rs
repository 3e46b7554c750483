//! Subscriber handles and the subscriber registry
//!
//! Each subscriber is the sending half of a bounded channel. The registry
//! never lends out its live map: broadcasts iterate over a copy taken by
//! [`SubscriberRegistry::snapshot`], so no lock is held while a send waits.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};

use super::error::{DeliveryError, HubError};
use super::reading::ReadingFrame;

/// Opaque subscriber handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// One registered observer
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    peer: String,
    tx: mpsc::Sender<ReadingFrame>,
}

impl Subscriber {
    /// Create a subscriber and the receiving half of its channel
    pub fn channel(
        id: SubscriberId,
        peer: impl Into<String>,
        buffer: usize,
    ) -> (Self, Subscription) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let subscriber = Self {
            id,
            peer: peer.into(),
            tx,
        };
        (subscriber, Subscription { id, rx })
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Peer label used in logs (remote address or similar)
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Liveness: false once the receiving half is gone
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Push a frame, waiting at most `timeout` for buffer space
    pub async fn deliver(
        &self,
        frame: ReadingFrame,
        timeout: Duration,
    ) -> Result<(), DeliveryError> {
        match tokio::time::timeout(timeout, self.tx.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(DeliveryError::Closed),
            Err(_) => Err(DeliveryError::TimedOut),
        }
    }

    /// Queue a frame without waiting; used for the subscribe-time replay
    pub(super) fn try_deliver(&self, frame: ReadingFrame) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::TimedOut,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Receiving side handed to the connection that subscribed
///
/// Dropping it closes the channel; the hub notices on the next send or sweep.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<ReadingFrame>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next frame; `None` once the hub dropped this subscriber
    pub async fn recv(&mut self) -> Option<ReadingFrame> {
        self.rx.recv().await
    }

    /// Take a frame if one is already queued
    pub fn try_recv(&mut self) -> Option<ReadingFrame> {
        self.rx.try_recv().ok()
    }
}

/// Live set of subscribers
///
/// Mutations take the write lock; `snapshot` copies the entries out under
/// the read lock and releases it before returning.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber
    ///
    /// A duplicate id is rejected and the already registered subscriber is
    /// left in place.
    pub async fn add(&self, subscriber: Subscriber) -> Result<(), HubError> {
        let mut subscribers = self.subscribers.write().await;

        if subscribers.contains_key(&subscriber.id) {
            return Err(HubError::DuplicateSubscriber(subscriber.id));
        }

        subscribers.insert(subscriber.id, subscriber);
        Ok(())
    }

    /// Deregister a subscriber; returns `None` if it was not registered
    pub async fn remove(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.write().await.remove(&id)
    }

    /// Point-in-time copy of the registered subscribers, ordered by id
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Remove every subscriber whose receiving half is gone
    pub async fn prune_closed(&self) -> Vec<SubscriberId> {
        let mut subscribers = self.subscribers.write().await;
        let closed: Vec<SubscriberId> = subscribers
            .values()
            .filter(|s| !s.is_live())
            .map(Subscriber::id)
            .collect();

        for id in &closed {
            subscribers.remove(id);
        }

        closed
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::hub::reading::Reading;

    fn frame(temp: &str) -> ReadingFrame {
        ReadingFrame::encode(Arc::new(Reading::new(temp, "40", "3", Utc::now()))).unwrap()
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = Subscriber::channel(SubscriberId(1), "test", 4);

        registry.add(sub).await.unwrap();
        assert!(registry.contains(SubscriberId(1)).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(SubscriberId(1)).await.is_some());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_duplicate_add_rejected() {
        let registry = SubscriberRegistry::new();
        let (first, _rx1) = Subscriber::channel(SubscriberId(7), "first", 4);
        let (second, _rx2) = Subscriber::channel(SubscriberId(7), "second", 4);

        registry.add(first).await.unwrap();
        let result = registry.add(second).await;
        assert!(matches!(
            result,
            Err(HubError::DuplicateSubscriber(SubscriberId(7)))
        ));

        // Original entry is kept
        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].peer(), "first");
    }

    #[tokio::test]
    async fn test_double_remove_is_noop() {
        let registry = SubscriberRegistry::new();
        let (sub, _rx) = Subscriber::channel(SubscriberId(1), "test", 4);
        registry.add(sub).await.unwrap();

        assert!(registry.remove(SubscriberId(1)).await.is_some());
        assert!(registry.remove(SubscriberId(1)).await.is_none());
        assert!(registry.remove(SubscriberId(99)).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_registry() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = Subscriber::channel(SubscriberId(1), "a", 4);
        registry.add(a).await.unwrap();

        let snapshot = registry.snapshot().await;

        let (b, _rx_b) = Subscriber::channel(SubscriberId(2), "b", 4);
        registry.add(b).await.unwrap();
        registry.remove(SubscriberId(1)).await;

        let ids: Vec<_> = snapshot.iter().map(Subscriber::id).collect();
        assert_eq!(ids, vec![SubscriberId(1)]);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_snapshot_during_concurrent_mutation() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let registry = Arc::new(SubscriberRegistry::new());
        let started = Arc::new(AtomicU64::new(0));

        let mutator = {
            let registry = Arc::clone(&registry);
            let started = Arc::clone(&started);
            tokio::spawn(async move {
                let mut receivers = Vec::new();
                for i in 0..200 {
                    started.store(i + 1, Ordering::SeqCst);
                    let (sub, rx) = Subscriber::channel(SubscriberId(i), "m", 1);
                    registry.add(sub).await.unwrap();
                    receivers.push(rx);
                    if i % 3 == 0 {
                        registry.remove(SubscriberId(i / 2)).await;
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        for _ in 0..200 {
            let snapshot = registry.snapshot().await;
            let added_so_far = started.load(Ordering::SeqCst);
            assert!(snapshot.iter().all(|s| s.id().0 < added_so_far));
            tokio::task::yield_now().await;
        }

        mutator.await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_and_receive() {
        let (sub, mut rx) = Subscriber::channel(SubscriberId(1), "test", 4);

        sub.deliver(frame("25"), Duration::from_millis(100))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.reading.temperature, "25");
    }

    #[test]
    fn test_recv_pending_until_frame_queued() {
        let (sub, mut rx) = Subscriber::channel(SubscriberId(1), "test", 4);
        let mut recv = tokio_test::task::spawn(rx.recv());

        tokio_test::assert_pending!(recv.poll());

        sub.try_deliver(frame("25")).unwrap();
        assert!(recv.is_woken());

        let received = tokio_test::assert_ready!(recv.poll()).unwrap();
        assert_eq!(received.reading.temperature, "25");
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_receiver_fails() {
        let (sub, rx) = Subscriber::channel(SubscriberId(1), "test", 4);
        drop(rx);

        assert!(!sub.is_live());
        let result = sub.deliver(frame("25"), Duration::from_millis(100)).await;
        assert_eq!(result, Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn test_deliver_to_full_buffer_times_out() {
        let (sub, _rx) = Subscriber::channel(SubscriberId(1), "test", 1);

        sub.deliver(frame("1"), Duration::from_millis(20))
            .await
            .unwrap();
        let result = sub.deliver(frame("2"), Duration::from_millis(20)).await;
        assert_eq!(result, Err(DeliveryError::TimedOut));
    }

    #[tokio::test]
    async fn test_prune_closed() {
        let registry = SubscriberRegistry::new();
        let (a, _rx_a) = Subscriber::channel(SubscriberId(1), "a", 4);
        let (b, rx_b) = Subscriber::channel(SubscriberId(2), "b", 4);
        registry.add(a).await.unwrap();
        registry.add(b).await.unwrap();

        drop(rx_b);

        assert_eq!(registry.prune_closed().await, vec![SubscriberId(2)]);
        assert!(registry.contains(SubscriberId(1)).await);
        assert!(!registry.contains(SubscriberId(2)).await);
    }
}

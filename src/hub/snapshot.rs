//! Read-only access to the latest reading
//!
//! The accessor is the read path for consumers that do not take part in
//! broadcast, such as the analysis routine. It only touches the lock-free
//! store and never waits on subscriber I/O.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};

use super::reading::Reading;
use super::store::ReadingStore;

/// A reading together with how stale it was when it was read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub reading: Arc<Reading>,
    pub age: TimeDelta,
}

impl Snapshot {
    /// Build a snapshot as seen at `now`; a reading from the future has age zero
    pub fn at(reading: Arc<Reading>, now: DateTime<Utc>) -> Self {
        let age = (now - reading.timestamp).max(TimeDelta::zero());
        Self { reading, age }
    }

    /// Age in fractional seconds
    pub fn age_secs(&self) -> f64 {
        self.age.num_milliseconds() as f64 / 1000.0
    }

    /// Age in fractional hours, as used for elapsed drying time
    pub fn elapsed_hours(&self) -> f64 {
        self.age_secs() / 3600.0
    }
}

/// Cloneable read-only handle onto the hub's reading store
#[derive(Debug, Clone)]
pub struct SnapshotAccessor {
    store: Arc<ReadingStore>,
}

impl SnapshotAccessor {
    pub(crate) fn new(store: Arc<ReadingStore>) -> Self {
        Self { store }
    }

    /// The latest reading and its age, or `None` before the first reading
    pub fn current(&self) -> Option<Snapshot> {
        self.current_at(Utc::now())
    }

    /// Like [`current`](Self::current) with an explicit clock
    pub fn current_at(&self, now: DateTime<Utc>) -> Option<Snapshot> {
        self.store.current().map(|reading| Snapshot::at(reading, now))
    }

    /// The latest reading without age information
    pub fn reading(&self) -> Option<Arc<Reading>> {
        self.store.current()
    }
}

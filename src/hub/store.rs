//! Latest-reading store
//!
//! Holds at most one reading. Replacement is a single atomic pointer swap,
//! so a reader sees either the previous reading or the new one, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use super::reading::Reading;

/// Single-slot store for the most recent reading
#[derive(Debug, Default)]
pub struct ReadingStore {
    latest: ArcSwapOption<Reading>,
}

impl ReadingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the latest reading
    pub fn replace(&self, reading: Arc<Reading>) {
        self.latest.store(Some(reading));
    }

    /// Get the latest reading, or `None` before the first `replace`
    pub fn current(&self) -> Option<Arc<Reading>> {
        self.latest.load_full()
    }

    /// Check whether any reading has been stored yet
    pub fn is_empty(&self) -> bool {
        self.latest.load().is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn reading(temp: &str) -> Arc<Reading> {
        Arc::new(Reading::new(temp, "40", "3", Utc::now()))
    }

    #[test]
    fn test_empty_store_returns_none() {
        let store = ReadingStore::new();
        assert!(store.current().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_last_write_wins() {
        let store = ReadingStore::new();

        for temp in ["20", "21", "22", "23"] {
            store.replace(reading(temp));
        }

        assert_eq!(store.current().unwrap().temperature, "23");
        assert!(!store.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_readers_never_see_torn_values() {
        let store = Arc::new(ReadingStore::new());

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..500 {
                    let v = i.to_string();
                    store.replace(Arc::new(Reading::new(&v, &v, &v, Utc::now())));
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for _ in 0..500 {
                    if let Some(r) = store.current() {
                        assert_eq!(r.temperature, r.humidity);
                        assert_eq!(r.humidity, r.vibration);
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.current().unwrap().temperature, "499");
    }
}

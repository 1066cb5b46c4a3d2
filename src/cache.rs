use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::FeedError;

pub const CACHE_TTL_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.timestamp).num_seconds() < CACHE_TTL_SECS
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Persistent key-value backend. A missing key is `Ok(None)`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, FeedError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), FeedError>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, FeedError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), FeedError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Timestamped entries on top of a [`KeyValueStore`].
///
/// Stale entries are left in place and ignored; the next `set` for the key
/// replaces them. Backend failures never surface to callers: a failed read is
/// a miss and a failed write is logged and dropped.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(backend, Arc::new(SystemClock))
    }

    pub fn with_clock(backend: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("cache read failed for {key}: {e}");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("discarding undecodable cache entry {key}: {e}");
                return None;
            }
        };

        if entry.is_fresh(self.clock.now()) {
            Some(entry.data)
        } else {
            let expired_at = entry.timestamp + Duration::seconds(CACHE_TTL_SECS);
            debug!("cache entry {key} expired at {expired_at}");
            None
        }
    }

    pub async fn set<T: Serialize>(&self, key: &str, data: T) {
        let entry = CacheEntry {
            data,
            timestamp: self.clock.now(),
        };

        let value = match serde_json::to_value(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to encode cache entry {key}: {e}");
                return;
            }
        };

        if let Err(e) = self.backend.set(key, value).await {
            warn!("cache write failed for {key}: {e}");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Mutex as StdMutex;

    pub struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        pub fn at(now: DateTime<Utc>) -> Arc<Self> {
            Arc::new(Self(StdMutex::new(now)))
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<Value>, FeedError> {
            Err(FeedError::parse("disk on fire"))
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), FeedError> {
            Err(FeedError::parse("disk on fire"))
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn get_after_set_returns_value() {
        let cache = CacheStore::with_clock(Arc::new(MemoryStore::new()), ManualClock::at(start()));
        cache.set("forumPosts", vec!["a", "b"]).await;

        let got: Option<Vec<String>> = cache.get("forumPosts").await;
        assert_eq!(got, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let clock = ManualClock::at(start());
        let cache = CacheStore::with_clock(Arc::new(MemoryStore::new()), clock.clone());
        cache.set("k", 42u32).await;

        clock.advance(Duration::minutes(4) + Duration::seconds(59));
        assert_eq!(cache.get::<u32>("k").await, Some(42));

        clock.advance(Duration::seconds(1));
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn stale_entry_is_kept_until_overwritten() {
        let clock = ManualClock::at(start());
        let backend = Arc::new(MemoryStore::new());
        let cache = CacheStore::with_clock(backend.clone(), clock.clone());
        cache.set("k", 1u32).await;
        clock.advance(Duration::minutes(10));

        assert_eq!(cache.get::<u32>("k").await, None);
        assert!(backend.get("k").await.unwrap().is_some());

        cache.set("k", 2u32).await;
        assert_eq!(cache.get::<u32>("k").await, Some(2));
    }

    #[tokio::test]
    async fn missing_and_broken_are_misses() {
        let cache = CacheStore::with_clock(Arc::new(MemoryStore::new()), ManualClock::at(start()));
        assert_eq!(cache.get::<u32>("nope").await, None);

        let broken = CacheStore::with_clock(Arc::new(BrokenStore), ManualClock::at(start()));
        broken.set("k", 1u32).await;
        assert_eq!(broken.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let backend = Arc::new(MemoryStore::new());
        backend
            .set("k", serde_json::json!({ "unexpected": true }))
            .await
            .unwrap();
        let cache = CacheStore::with_clock(backend, ManualClock::at(start()));
        assert_eq!(cache.get::<u32>("k").await, None);
    }
}

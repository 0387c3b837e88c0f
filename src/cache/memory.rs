//! Process-local TTL cache
//!
//! Backed by `cached::ExpiringValueCache`, which gives each value its own
//! deadline and evicts least-recently-used entries once `capacity` is hit.
//! Expired entries are dropped on read and by [`MemoryCache::purge_expired`],
//! which the sweeper task calls periodically.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cached::{CanExpire, Cached, ExpiringValueCache};
use tracing::debug;

use super::{CacheError, CacheStore};

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl CanExpire for Entry {
    fn is_expired(&self) -> bool {
        self.expires_at <= Instant::now()
    }
}

pub struct MemoryCache {
    entries: Mutex<ExpiringValueCache<String, Entry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(ExpiringValueCache::with_size(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ExpiringValueCache<String, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.cache_size();
        entries.flush();
        before - entries.cache_size()
    }

    pub fn len(&self) -> usize {
        self.lock().cache_size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge on a fixed interval until the runtime shuts down
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let dropped = self.purge_expired();
            if dropped > 0 {
                debug!(dropped, "Expired cache entries purged");
            }
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.lock().cache_get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.lock().cache_set(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        self.lock().cache_remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_del() {
        let cache = MemoryCache::new();
        assert_eq!(cache.get("k").await.unwrap(), None);

        cache.set("k", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        cache.del("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new();
        cache.set("k", "v".into(), Duration::ZERO).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("old", "v".into(), Duration::ZERO).await.unwrap();
        cache.set("new", "v".into(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_least_recent() {
        let cache = MemoryCache::with_capacity(2);
        for key in ["a", "b", "c"] {
            cache.set(key, key.into(), Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.get("c").await.unwrap().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_sweeper_drops_expired_entries() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("old", "v".into(), Duration::ZERO).await.unwrap();
        cache.set("new", "v".into(), Duration::from_secs(600)).await.unwrap();

        let sweeper = tokio::spawn(cache.clone().run_sweeper(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();

        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_del_missing_is_ok() {
        let cache = MemoryCache::new();
        assert!(cache.del("absent").await.is_ok());
    }
}

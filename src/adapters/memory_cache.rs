//! In-process [`CacheStore`] with per-entry expiry.
//!
//! Used by the test suite and when Redis is disabled. Unlike Redis it is not
//! shared between gateway replicas, so tokens revoked by the users service
//! are only seen through the Redis adapter.
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use scc::HashMap;

use crate::ports::cache_store::CacheStore;

#[derive(Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

pub struct MemoryCacheStore {
    entries: HashMap<String, MemoryEntry>,
    default_ttl: Option<Duration>,
    online: AtomicBool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::with_default_ttl(None)
    }

    pub fn with_default_ttl(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: HashMap::new(),
            default_ttl,
            online: AtomicBool::new(true),
        }
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    /// While offline every operation fails the way a dead Redis would.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let mut count = 0;
        self.entries.iter_sync(|_, entry| {
            if !entry.is_expired(now) {
                count += 1;
            }
            true
        });
        count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn ping(&self) -> bool {
        self.is_online()
    }

    async fn get(&self, key: &str) -> Option<String> {
        if !self.is_online() {
            return None;
        }

        let entry = self
            .entries
            .get_async(key)
            .await
            .map(|entry| entry.get().clone())?;

        let now = Instant::now();
        if entry.is_expired(now) {
            // A concurrent `set` may have replaced the entry since the read.
            self.entries
                .remove_if_async(key, |current| current.is_expired(now))
                .await;
            return None;
        }
        Some(entry.value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        if !self.is_online() {
            return false;
        }

        let entry = MemoryEntry {
            value: value.to_string(),
            expires_at: ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl),
        };

        self.entries.upsert_async(key.to_string(), entry).await;
        true
    }

    async fn delete(&self, key: &str) -> bool {
        if !self.is_online() {
            return false;
        }
        self.entries.remove_async(key).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryCacheStore::new();
        assert!(store.ping().await);
        assert!(store.get("k").await.is_none());

        assert!(store.set("k", "v1", None).await);
        assert_eq!(store.get("k").await.as_deref(), Some("v1"));

        assert!(store.set("k", "v2", None).await);
        assert_eq!(store.get("k").await.as_deref(), Some("v2"));

        assert!(store.delete("k").await);
        assert!(!store.delete("k").await);
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let store = MemoryCacheStore::new();
        store
            .set("short", "v", Some(Duration::from_millis(20)))
            .await;
        assert!(store.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("short").await.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_when_none_given() {
        let store = MemoryCacheStore::with_default_ttl(Some(Duration::from_millis(20)));
        store.set("k", "v", None).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_offline_store_degrades() {
        let store = MemoryCacheStore::new();
        store.set("k", "v", None).await;

        store.set_online(false);
        assert!(!store.ping().await);
        assert!(store.get("k").await.is_none());
        assert!(!store.set("k2", "v", None).await);
        assert!(!store.delete("k").await);

        store.set_online(true);
        assert_eq!(store.get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_len_counts_live_entries_only() {
        let store = MemoryCacheStore::new();
        assert!(store.is_empty());

        store.set("a", "1", None).await;
        store.set("b", "2", Some(Duration::from_millis(20))).await;
        store.set("a", "3", None).await;
        assert_eq!(store.len(), 2);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_expired_entry() {
        let store = MemoryCacheStore::new();
        store.set("k", "old", Some(Duration::from_millis(10))).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        store.set("k", "new", None).await;
        assert_eq!(store.get("k").await.as_deref(), Some("new"));
        assert_eq!(store.get("k").await.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_survives_expiry_cleanup() {
        let store = std::sync::Arc::new(MemoryCacheStore::new());
        for round in 0..50 {
            store.set("tok", "stale", Some(Duration::from_millis(1))).await;
            tokio::time::sleep(Duration::from_millis(2)).await;

            let reader = {
                let store = store.clone();
                tokio::spawn(async move { store.get("tok").await })
            };
            store.set("tok", "fresh", None).await;
            let _ = reader.await;

            assert_eq!(
                store.get("tok").await.as_deref(),
                Some("fresh"),
                "round {round}"
            );
        }
    }
}

//! Bounded key-value store capability and its in-memory implementation.
//!
//! The edge only depends on [`CacheStore`]; [`MemoryStore`] is the default
//! backing used by the server, with a fixed entry capacity, least-recently-used
//! eviction and per-entry expiry.

use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;

/// Key-value storage for encoded cache entries.
///
/// Implementations must tolerate concurrent callers and replace a key's value
/// atomically; a reader sees either the old or the new value, never a mix.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value for `key`, if present and not expired.
    async fn get(&self, key: &str) -> Option<Bytes>;

    /// Insert or replace `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration);

    /// Remove `key`, returning whether it was present.
    async fn delete(&self, key: &str) -> bool;
}

struct Slot {
    value: Bytes,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory LRU store with per-entry TTL.
pub struct MemoryStore {
    lru: Mutex<LruCache<String, Slot>>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { lru: Mutex::new(LruCache::new(capacity)) }
    }

    pub async fn capacity(&self) -> usize {
        self.lru.lock().await.cap().get()
    }

    /// Number of entries held, expired or not.
    pub async fn len(&self) -> usize {
        self.lru.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remaining lifetime of `key`, if present and not expired. Does not touch recency.
    ///
    /// An entry whose expiry could not be represented reports `Duration::MAX`.
    pub async fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let lru = self.lru.lock().await;
        let now = Instant::now();
        let slot = lru.peek(key).filter(|slot| !slot.is_expired(now))?;
        Some(slot.expires_at.map_or(Duration::MAX, |at| at - now))
    }

    /// Drop every expired entry.
    ///
    /// Returns the number of removed entries.
    pub async fn purge_expired(&self) -> usize {
        let mut lru = self.lru.lock().await;
        let now = Instant::now();
        let expired: Vec<String> =
            lru.iter().filter(|(_, slot)| slot.is_expired(now)).map(|(key, _)| key.clone()).collect();
        for key in &expired {
            lru.pop(key);
        }
        expired.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut lru = self.lru.lock().await;

        if lru.peek(key)?.is_expired(Instant::now()) {
            lru.pop(key);
            tracing::debug!(key, "cache entry expired");
            return None;
        }

        lru.get(key).map(|slot| slot.value.clone())
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        let expires_at = Instant::now().checked_add(ttl);
        if expires_at.is_none() {
            tracing::debug!(key, ttl_secs = ttl.as_secs(), "ttl past the clock range, entry never expires");
        }

        let mut lru = self.lru.lock().await;
        if let Some((evicted, _)) = lru.push(key.to_string(), Slot { value, expires_at })
            && evicted != key
        {
            tracing::debug!(key = %evicted, "evicted least recently used entry");
        }
    }

    async fn delete(&self, key: &str) -> bool {
        self.lru.lock().await.pop(key).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new(4);
        store.set("GET:/foo", Bytes::from_static(b"foo"), HOUR).await;
        assert_eq!(store.get("GET:/foo").await, Some(Bytes::from_static(b"foo")));
        assert_eq!(store.get("GET:/missing").await, None);
    }

    #[tokio::test]
    async fn test_set_replaces_value() {
        let store = MemoryStore::new(4);
        store.set("k", Bytes::from_static(b"old"), HOUR).await;
        store.set("k", Bytes::from_static(b"new"), HOUR).await;
        assert_eq!(store.get("k").await, Some(Bytes::from_static(b"new")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new(4);
        store.set("k", Bytes::from_static(b"v"), HOUR).await;
        assert!(store.delete("k").await);
        assert!(!store.delete("k").await);
        assert_eq!(store.get("k").await, None);
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let store = MemoryStore::new(2);
        store.set("a", Bytes::from_static(b"1"), HOUR).await;
        store.set("b", Bytes::from_static(b"2"), HOUR).await;

        // Touch "a" so that "b" becomes the eviction candidate.
        assert!(store.get("a").await.is_some());
        store.set("c", Bytes::from_static(b"3"), HOUR).await;

        assert_eq!(store.len().await, 2);
        assert!(store.get("b").await.is_none());
        assert!(store.get("a").await.is_some());
        assert!(store.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_insertion_order_eviction_without_reads() {
        let store = MemoryStore::new(3);
        for key in ["a", "b", "c", "d", "e"] {
            store.set(key, Bytes::from_static(b"x"), HOUR).await;
        }
        assert!(store.get("a").await.is_none());
        assert!(store.get("b").await.is_none());
        for key in ["c", "d", "e"] {
            assert!(store.get(key).await.is_some(), "{key} should survive");
        }
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = MemoryStore::new(4);
        store.set("short", Bytes::from_static(b"v"), Duration::from_millis(20)).await;
        assert!(store.get("short").await.is_some());

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get("short").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = MemoryStore::new(4);
        store.set("expiring", Bytes::from_static(b"v"), Duration::from_millis(20)).await;
        store.set("fresh", Bytes::from_static(b"v"), HOUR).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get("fresh").await.is_some());
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_does_not_panic() {
        let store = MemoryStore::new(4);
        store.set("forever", Bytes::from_static(b"v"), Duration::MAX).await;
        assert_eq!(store.get("forever").await, Some(Bytes::from_static(b"v")));
        assert_eq!(store.ttl_remaining("forever").await, Some(Duration::MAX));
        assert_eq!(store.purge_expired().await, 0);
    }

    #[tokio::test]
    async fn test_zero_capacity_holds_one_entry() {
        let store = MemoryStore::new(0);
        assert_eq!(store.capacity().await, 1);
        store.set("a", Bytes::from_static(b"1"), HOUR).await;
        store.set("b", Bytes::from_static(b"2"), HOUR).await;
        assert_eq!(store.len().await, 1);
        assert!(store.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let store = MemoryStore::new(4);
        store.set("k", Bytes::from_static(b"v"), Duration::from_secs(6)).await;
        let remaining = store.ttl_remaining("k").await.unwrap();
        assert!(remaining <= Duration::from_secs(6));
        assert!(remaining > Duration::from_secs(5));
        assert_eq!(store.ttl_remaining("other").await, None);
    }
}

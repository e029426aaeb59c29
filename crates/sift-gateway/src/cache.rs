//! Content-addressed response cache.
//!
//! A cache entry maps a cache key to a previously computed result. Written
//! only on successful inference calls, read before every call, bounded by a
//! fixed TTL. A cache is an optimization, not a correctness-bearing store:
//! concurrent writers of the same key are last-write-wins.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

/// Fixed response TTL: 24 hours.
pub const RESPONSE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Soft capacity before opportunistic expiry pruning.
const PRUNE_THRESHOLD: usize = 4096;

/// A cached inference result.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Produced content.
    pub content: String,
    /// Tokens the original call consumed.
    pub tokens_used: u64,
    /// Cost estimate of the original call in USD.
    pub cost: f64,
    /// Model that produced the content.
    pub model: String,
}

/// Response cache backing store.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Look up an entry. Expired entries are misses.
    async fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Store an entry with the given TTL.
    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration);
}

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

/// In-process response cache.
pub struct MemoryResponseCache {
    slots: DashMap<String, Slot>,
}

impl MemoryResponseCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Number of live (possibly expired, not yet pruned) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop expired entries when the map grows past the threshold.
    fn prune_if_large(&self) {
        if self.slots.len() > PRUNE_THRESHOLD {
            let now = Instant::now();
            self.slots.retain(|_, slot| slot.expires_at > now);
        }
    }
}

impl Default for MemoryResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResponseCache for MemoryResponseCache {
    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let expired = match self.slots.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => return Some(slot.entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            let _ = self.slots.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        self.prune_if_large();
        let _ = self.slots.insert(
            key.to_string(),
            Slot {
                entry,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> CacheEntry {
        CacheEntry {
            content: content.into(),
            tokens_used: 100,
            cost: 0.01,
            model: "claude-haiku-4-5".into(),
        }
    }

    #[tokio::test]
    async fn put_then_get() {
        let cache = MemoryResponseCache::new();
        cache.put("k1", entry("hello"), RESPONSE_TTL).await;
        let got = cache.get("k1").await.unwrap();
        assert_eq!(got.content, "hello");
        assert_eq!(got.tokens_used, 100);
    }

    #[tokio::test]
    async fn miss_on_unknown_key() {
        let cache = MemoryResponseCache::new();
        assert!(cache.get("nope").await.is_none());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_and_removed() {
        let cache = MemoryResponseCache::new();
        cache.put("k1", entry("old"), Duration::from_millis(0)).await;
        assert!(cache.get("k1").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let cache = MemoryResponseCache::new();
        cache.put("k1", entry("first"), RESPONSE_TTL).await;
        cache.put("k1", entry("second"), RESPONSE_TTL).await;
        assert_eq!(cache.get("k1").await.unwrap().content, "second");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn response_ttl_is_24_hours() {
        assert_eq!(RESPONSE_TTL, Duration::from_secs(86_400));
    }
}

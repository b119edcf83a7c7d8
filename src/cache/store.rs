//! Cache storage contract and the in-memory implementation.

use std::num::NonZeroUsize;
use std::sync::RwLock;

use async_trait::async_trait;
use lru::LruCache;

use crate::infra::error::InfraError;
use crate::util::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// Key/value backend holding serialized API responses.
///
/// Keys are ASCII strings free of `{}()/\@:`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, InfraError>;
    async fn set(&self, key: &str, value: String) -> Result<(), InfraError>;
    async fn clear(&self) -> Result<(), InfraError>;
}

/// LRU-bounded in-process cache.
pub struct MemoryCache {
    entries: RwLock<LruCache<String, String>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Create a cache holding at most `capacity` entries, clamping to 1 if zero.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read without touching LRU order.
    pub fn peek(&self, key: &str) -> Option<String> {
        rw_read(&self.entries, SOURCE, "peek").peek(key).cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(rw_write(&self.entries, SOURCE, "get").get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), InfraError> {
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), InfraError> {
        rw_write(&self.entries, SOURCE, "clear").clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[tokio::test]
    async fn memory_cache_roundtrip() -> Result<(), InfraError> {
        let cache = MemoryCache::with_capacity(8);
        assert!(cache.get("k").await?.is_none());

        cache.set("k", "v".to_string()).await?;
        assert_eq!(cache.get("k").await?.as_deref(), Some("v"));

        cache.clear().await?;
        assert!(cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn memory_cache_evicts_least_recently_used() -> Result<(), InfraError> {
        let cache = MemoryCache::with_capacity(2);
        cache.set("a", "1".to_string()).await?;
        cache.set("b", "2".to_string()).await?;
        cache.get("a").await?;
        cache.set("c", "3".to_string()).await?;

        assert!(cache.peek("a").is_some());
        assert!(cache.peek("b").is_none());
        assert!(cache.peek("c").is_some());
        Ok(())
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let cache = MemoryCache::with_capacity(0);
        assert_eq!(rw_read(&cache.entries, SOURCE, "test").cap().get(), 1);
    }

    #[tokio::test]
    async fn memory_cache_recovers_from_poisoned_lock() -> Result<(), InfraError> {
        let cache = MemoryCache::with_capacity(2);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = cache
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        cache.set("k", "v".to_string()).await?;
        assert_eq!(cache.get("k").await?.as_deref(), Some("v"));
        Ok(())
    }
}

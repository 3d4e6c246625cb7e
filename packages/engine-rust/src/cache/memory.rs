//! In-memory [`Cache`] implementation backed by [`DashMap`].
//!
//! Provides concurrent read/write access without external locking. Used by
//! default wiring and tests; production deployments may substitute a
//! backend over the same capability.

use async_trait::async_trait;
use dashmap::DashMap;

use conflux_core::{Cache, CacheError};

/// In-memory cache backed by [`DashMap`] for concurrent access.
///
/// Reads are lock-free; writes use fine-grained sharding internally.
pub struct MemoryCache<V> {
    entries: DashMap<String, V>,
}

impl<V> MemoryCache<V> {
    /// Creates a new, empty `MemoryCache`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for MemoryCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync,
{
    async fn put(&self, key: &str, value: V, overwrite: bool) -> Result<(), CacheError> {
        if !overwrite && self.entries.contains_key(key) {
            return Err(CacheError::AlreadyExists {
                key: key.to_string(),
            });
        }
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.contains_key(key))
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.entries.iter().map(|e| e.key().clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_remove_round_trip() {
        let cache: MemoryCache<String> = MemoryCache::new();
        cache.put("a", "one".to_string(), false).await.unwrap();

        assert_eq!(cache.get("a").await.unwrap(), Some("one".to_string()));
        assert!(cache.contains("a").await.unwrap());
        assert!(cache.remove("a").await.unwrap());
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert!(!cache.remove("a").await.unwrap());
    }

    #[tokio::test]
    async fn put_without_overwrite_rejects_existing_key() {
        let cache: MemoryCache<i64> = MemoryCache::new();
        cache.put("k", 1, false).await.unwrap();

        let err = cache.put("k", 2, false).await.unwrap_err();
        assert!(matches!(err, CacheError::AlreadyExists { key } if key == "k"));
        assert_eq!(cache.get("k").await.unwrap(), Some(1));

        cache.put("k", 2, true).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn keys_lists_every_entry() {
        let cache: MemoryCache<i64> = MemoryCache::new();
        cache.put("a", 1, false).await.unwrap();
        cache.put("b", 2, false).await.unwrap();

        let mut keys = cache.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }
}

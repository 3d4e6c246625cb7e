//! Cache capability consumed by the named-operation store and, optionally,
//! by federated storage for policy mirroring.

use async_trait::async_trait;

/// Errors surfaced by a [`Cache`] backend.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache entry `{key}` already exists and overwrite is disabled")]
    AlreadyExists { key: String },
    #[error("cache entry `{key}` does not exist")]
    NotFound { key: String },
    #[error("cache backend failure: {0}")]
    Backend(String),
}

/// String-keyed cache of values of type `V`.
///
/// All methods are async so implementations backed by external services can
/// honor task cancellation. Used as `Arc<dyn Cache<V>>`.
#[async_trait]
pub trait Cache<V>: Send + Sync {
    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyExists`] if the key is present and
    /// `overwrite` is false.
    async fn put(&self, key: &str, value: V, overwrite: bool) -> Result<(), CacheError>;

    /// Retrieves the value under `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<V>, CacheError>;

    /// Whether `key` is present.
    async fn contains(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes the entry under `key`, returning whether one existed.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Every stored key, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;
}

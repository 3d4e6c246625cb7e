//! Partition of sub-executors by access policy.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use conflux_core::{Cache, EngineError, EngineResult, User};

use crate::executor::Executor;

use super::access::FederatedAccess;

/// Maps each [`FederatedAccess`] policy to the sub-executors registered
/// under it.
///
/// Executor ids are unique across the whole storage, regardless of bucket.
/// Mutations are atomic with respect to readers: a reader observes either
/// the pre- or post-mutation state, never a partial one. An optional mirror
/// cache persists each executor's policy by id.
pub struct FederatedExecutorStorage {
    buckets: RwLock<IndexMap<FederatedAccess, Vec<Arc<Executor>>>>,
    mirror: Option<Arc<dyn Cache<FederatedAccess>>>,
}

impl FederatedExecutorStorage {
    /// Creates an empty storage without a mirror.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(IndexMap::new()),
            mirror: None,
        }
    }

    /// Creates an empty storage mirroring policies into `cache`.
    #[must_use]
    pub fn with_mirror(cache: Arc<dyn Cache<FederatedAccess>>) -> Self {
        Self {
            buckets: RwLock::new(IndexMap::new()),
            mirror: Some(cache),
        }
    }

    /// Registers a sub-executor under an access policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Overwriting`] if any bucket already holds an
    /// executor with the same id; the existing state is unchanged.
    pub async fn put(
        &self,
        executor: Arc<Executor>,
        access: FederatedAccess,
    ) -> EngineResult<()> {
        let id = executor.id().to_string();
        {
            let mut buckets = self.buckets.write();
            if buckets
                .values()
                .flatten()
                .any(|existing| existing.id() == id)
            {
                return Err(EngineError::Overwriting { key: id });
            }
            buckets.entry(access.clone()).or_default().push(executor);
        }
        if let Some(mirror) = &self.mirror {
            mirror.put(&id, access, true).await?;
        }
        Ok(())
    }

    /// Removes the executor with `id` from every bucket visible to `user`,
    /// returning whether anything was removed.
    ///
    /// A caller cannot remove an executor whose policy they cannot see,
    /// even when the id matches.
    ///
    /// # Errors
    ///
    /// Propagates mirror failures.
    pub async fn remove(&self, id: &str, user: &User) -> EngineResult<bool> {
        let removed = {
            let mut buckets = self.buckets.write();
            let mut removed = false;
            for (access, executors) in buckets.iter_mut() {
                if access.is_valid_to_execute(Some(user)) {
                    let before = executors.len();
                    executors.retain(|executor| executor.id() != id);
                    removed |= executors.len() != before;
                }
            }
            buckets.retain(|_, executors| !executors.is_empty());
            removed
        };
        if removed {
            if let Some(mirror) = &self.mirror {
                mirror.remove(id).await?;
            }
        }
        Ok(removed)
    }

    /// Resolves target executors for a request.
    ///
    /// With `ids`, every requested id must belong to a bucket visible to
    /// the caller, and the result preserves the requested order. Without
    /// `ids`, returns every executor from visible buckets that is not
    /// `disabled_by_default`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unauthorised`] naming the requested ids that
    /// are not visible.
    pub fn get(&self, user: &User, ids: Option<&[String]>) -> EngineResult<Vec<Arc<Executor>>> {
        let buckets = self.buckets.read();
        match ids {
            Some(ids) => {
                let mut visible: IndexMap<&str, &Arc<Executor>> = IndexMap::new();
                for (access, executors) in buckets.iter() {
                    if access.is_valid_to_execute(Some(user)) {
                        for executor in executors {
                            visible.entry(executor.id()).or_insert(executor);
                        }
                    }
                }

                let invisible: Vec<&str> = ids
                    .iter()
                    .map(String::as_str)
                    .filter(|id| !visible.contains_key(id))
                    .collect();
                if !invisible.is_empty() {
                    return Err(EngineError::Unauthorised(format!(
                        "executor ids not visible to user `{}`: {}",
                        user.id(),
                        invisible.join(", ")
                    )));
                }

                Ok(ids
                    .iter()
                    .filter_map(|id| visible.get(id.as_str()).map(|executor| (*executor).clone()))
                    .collect())
            }
            None => {
                let mut out = Vec::new();
                for (access, executors) in buckets.iter() {
                    if !access.disabled_by_default && access.is_valid_to_execute(Some(user)) {
                        out.extend(executors.iter().cloned());
                    }
                }
                Ok(out)
            }
        }
    }

    /// Every executor in a bucket visible to `user`, including disabled
    /// ones, in insertion order.
    #[must_use]
    pub fn get_all(&self, user: &User) -> Vec<Arc<Executor>> {
        let buckets = self.buckets.read();
        let mut out = Vec::new();
        for (access, executors) in buckets.iter() {
            if access.is_valid_to_execute(Some(user)) {
                out.extend(executors.iter().cloned());
            }
        }
        out
    }

    /// Ids of every executor visible to `user`, including disabled ones.
    #[must_use]
    pub fn get_all_ids(&self, user: &User) -> Vec<String> {
        self.get_all(user)
            .iter()
            .map(|executor| executor.id().to_string())
            .collect()
    }
}

impl Default for FederatedExecutorStorage {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::cache::MemoryCache;
    use crate::config::EngineConfig;

    use super::*;

    fn executor(id: &str) -> Arc<Executor> {
        Arc::new(Executor::new(EngineConfig::with_id(id)))
    }

    #[tokio::test]
    async fn duplicate_id_across_buckets_is_rejected_and_state_unchanged() {
        let storage = FederatedExecutorStorage::new();
        let owner = User::new("owner");
        storage
            .put(executor("A"), FederatedAccess::public("owner"))
            .await
            .unwrap();

        let err = storage
            .put(executor("A"), FederatedAccess::private("other", ["auth"]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Overwriting { key } if key == "A"));

        let all = storage.get_all(&owner);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id(), "A");
    }

    #[tokio::test]
    async fn get_preserves_requested_order() {
        let storage = FederatedExecutorStorage::new();
        for id in ["A", "B", "C"] {
            storage
                .put(executor(id), FederatedAccess::public("owner"))
                .await
                .unwrap();
        }

        let ids = ["C".to_string(), "A".to_string(), "B".to_string()];
        let resolved = storage.get(&User::new("anyone"), Some(&ids)).unwrap();
        let resolved: Vec<&str> = resolved.iter().map(|e| e.id()).collect();
        assert_eq!(resolved, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn get_names_invisible_ids() {
        let storage = FederatedExecutorStorage::new();
        storage
            .put(executor("A"), FederatedAccess::public("owner"))
            .await
            .unwrap();
        storage
            .put(executor("X"), FederatedAccess::private("owner", ["secret"]))
            .await
            .unwrap();

        let ids = ["A".to_string(), "X".to_string()];
        let err = storage
            .get(&User::new("outsider"), Some(&ids))
            .unwrap_err();
        match err {
            EngineError::Unauthorised(message) => {
                assert!(message.contains("X"));
                assert!(!message.contains('A'));
            }
            other => panic!("expected unauthorised, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unspecified_targets_exclude_disabled_buckets() {
        let storage = FederatedExecutorStorage::new();
        storage
            .put(executor("Enabled"), FederatedAccess::public("owner"))
            .await
            .unwrap();
        storage
            .put(
                executor("Disabled"),
                FederatedAccess::public("owner").disabled_by_default(),
            )
            .await
            .unwrap();

        let user = User::new("anyone");
        let defaults = storage.get(&user, None).unwrap();
        let default_ids: Vec<&str> = defaults.iter().map(|e| e.id()).collect();
        assert_eq!(default_ids, vec!["Enabled"]);

        // Explicit selection and full listing still reach the disabled one.
        let explicit = storage
            .get(&user, Some(&["Disabled".to_string()]))
            .unwrap();
        assert_eq!(explicit[0].id(), "Disabled");
        assert_eq!(storage.get_all_ids(&user), vec!["Enabled", "Disabled"]);
    }

    #[tokio::test]
    async fn remove_only_touches_visible_buckets() {
        let storage = FederatedExecutorStorage::new();
        storage
            .put(executor("Hidden"), FederatedAccess::private("owner", ["secret"]))
            .await
            .unwrap();

        // An outsider cannot remove an executor they cannot see.
        assert!(!storage
            .remove("Hidden", &User::new("outsider"))
            .await
            .unwrap());
        assert_eq!(storage.get_all_ids(&User::new("owner")).len(), 1);

        // The owner can.
        assert!(storage.remove("Hidden", &User::new("owner")).await.unwrap());
        assert!(storage.get_all_ids(&User::new("owner")).is_empty());
    }

    #[tokio::test]
    async fn mirror_tracks_put_and_remove() {
        let mirror: Arc<MemoryCache<FederatedAccess>> = Arc::new(MemoryCache::new());
        let storage = FederatedExecutorStorage::with_mirror(mirror.clone());
        let access = FederatedAccess::public("owner");

        storage.put(executor("A"), access.clone()).await.unwrap();
        assert_eq!(mirror.get("A").await.unwrap(), Some(access));

        storage.remove("A", &User::new("owner")).await.unwrap();
        assert_eq!(mirror.get("A").await.unwrap(), None);
    }
}

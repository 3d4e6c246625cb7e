//! Access-controlled named-operation store over the cache capability.

use std::sync::Arc;

use conflux_core::{Cache, CacheError, EngineError, EngineResult, User};

use super::detail::NamedOperationDetail;

/// Store of [`NamedOperationDetail`] values, gated by creator id, admin
/// auth, and read/write roles.
///
/// All persistence goes through the [`Cache`] capability, so the backing
/// store may be in-memory or external.
pub struct NamedOperationCache {
    cache: Arc<dyn Cache<NamedOperationDetail>>,
}

impl NamedOperationCache {
    /// Creates a store over the given cache backend.
    #[must_use]
    pub fn new(cache: Arc<dyn Cache<NamedOperationDetail>>) -> Self {
        Self { cache }
    }

    /// Validates and stores a detail.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] if the template fails store-time checks.
    /// - [`EngineError::Overwriting`] if the name exists and `overwrite` is
    ///   false; the stored detail is untouched.
    /// - [`EngineError::Unauthorised`] if the name exists and the caller
    ///   lacks write access to the stored detail.
    pub async fn add(
        &self,
        detail: NamedOperationDetail,
        overwrite: bool,
        user: &User,
        admin_auth: Option<&str>,
    ) -> EngineResult<()> {
        detail.validate()?;

        if let Some(existing) = self.cache.get(&detail.operation_name).await? {
            if !overwrite {
                return Err(EngineError::Overwriting {
                    key: detail.operation_name,
                });
            }
            if !existing.has_write_access(user, admin_auth) {
                return Err(EngineError::Unauthorised(format!(
                    "user `{}` may not overwrite named operation `{}`",
                    user.id(),
                    detail.operation_name
                )));
            }
        }

        let name = detail.operation_name.clone();
        self.cache.put(&name, detail, true).await?;
        Ok(())
    }

    /// Fetches a detail the caller may read.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotFound`] (as [`EngineError::Cache`]) if absent.
    /// - [`EngineError::Unauthorised`] if the caller lacks read access.
    pub async fn get(
        &self,
        name: &str,
        user: &User,
        admin_auth: Option<&str>,
    ) -> EngineResult<NamedOperationDetail> {
        let detail = self.cache.get(name).await?.ok_or_else(|| {
            EngineError::Cache(CacheError::NotFound {
                key: name.to_string(),
            })
        })?;
        if detail.has_read_access(user, admin_auth) {
            Ok(detail)
        } else {
            Err(EngineError::Unauthorised(format!(
                "user `{}` may not read named operation `{name}`",
                user.id()
            )))
        }
    }

    /// Every detail visible to the caller, sorted by name. Invisible
    /// entries are silently skipped.
    ///
    /// # Errors
    ///
    /// Propagates backend failures.
    pub async fn get_all(
        &self,
        user: &User,
        admin_auth: Option<&str>,
    ) -> EngineResult<Vec<NamedOperationDetail>> {
        let mut names = self.cache.keys().await?;
        names.sort();

        let mut visible = Vec::new();
        for name in names {
            if let Some(detail) = self.cache.get(&name).await? {
                if detail.has_read_access(user, admin_auth) {
                    visible.push(detail);
                }
            }
        }
        Ok(visible)
    }

    /// Deletes a detail the caller may write.
    ///
    /// # Errors
    ///
    /// - [`CacheError::NotFound`] (as [`EngineError::Cache`]) if absent.
    /// - [`EngineError::Unauthorised`] if the caller lacks write access.
    pub async fn delete(
        &self,
        name: &str,
        user: &User,
        admin_auth: Option<&str>,
    ) -> EngineResult<()> {
        let detail = self.cache.get(name).await?.ok_or_else(|| {
            EngineError::Cache(CacheError::NotFound {
                key: name.to_string(),
            })
        })?;
        if !detail.has_write_access(user, admin_auth) {
            return Err(EngineError::Unauthorised(format!(
                "user `{}` may not delete named operation `{name}`",
                user.id()
            )));
        }
        self.cache.remove(name).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use conflux_core::User;

    use crate::cache::MemoryCache;

    use super::*;

    fn store() -> NamedOperationCache {
        NamedOperationCache::new(Arc::new(MemoryCache::new()))
    }

    fn sample(name: &str, creator: &str) -> NamedOperationDetail {
        NamedOperationDetail {
            operation_name: name.to_string(),
            operations: r#"[{"id":"Echo","msg":"hi"}]"#.to_string(),
            description: String::new(),
            creator_id: creator.to_string(),
            read_access_roles: Vec::new(),
            write_access_roles: Vec::new(),
            parameters: indexmap::IndexMap::new(),
            score: None,
            input_kind: None,
        }
    }

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let store = store();
        let alice = User::new("alice");
        store
            .add(sample("double", "alice"), false, &alice, None)
            .await
            .unwrap();

        let detail = store.get("double", &alice, None).await.unwrap();
        assert_eq!(detail.operation_name, "double");
    }

    #[tokio::test]
    async fn add_without_overwrite_rejects_existing_name() {
        let store = store();
        let alice = User::new("alice");
        store
            .add(sample("double", "alice"), false, &alice, None)
            .await
            .unwrap();

        let err = store
            .add(sample("double", "alice"), false, &alice, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Overwriting { key } if key == "double"));
    }

    #[tokio::test]
    async fn overwrite_requires_write_access() {
        let store = store();
        let alice = User::new("alice");
        store
            .add(sample("double", "alice"), false, &alice, None)
            .await
            .unwrap();

        let mallory = User::new("mallory");
        let err = store
            .add(sample("double", "mallory"), true, &mallory, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorised(_)));

        // The admin auth bypasses the write-role check.
        let admin = User::with_auths("root", ["superuser"]);
        store
            .add(sample("double", "root"), true, &admin, Some("superuser"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn get_rejects_missing_and_invisible() {
        let store = store();
        let alice = User::new("alice");

        let err = store.get("ghost", &alice, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cache(CacheError::NotFound { .. })
        ));

        store
            .add(sample("secret", "alice"), false, &alice, None)
            .await
            .unwrap();
        let err = store
            .get("secret", &User::new("mallory"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorised(_)));
    }

    #[tokio::test]
    async fn get_all_filters_by_visibility() {
        let store = store();
        let alice = User::new("alice");
        let bob = User::new("bob");

        store
            .add(sample("a", "alice"), false, &alice, None)
            .await
            .unwrap();
        let mut shared = sample("b", "alice");
        shared.read_access_roles = vec!["everyone".to_string()];
        store.add(shared, false, &alice, None).await.unwrap();

        assert_eq!(store.get_all(&alice, None).await.unwrap().len(), 2);
        assert_eq!(store.get_all(&bob, None).await.unwrap().len(), 0);

        let reader = User::with_auths("carol", ["everyone"]);
        let visible = store.get_all(&reader, None).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].operation_name, "b");
    }

    #[tokio::test]
    async fn delete_requires_write_access() {
        let store = store();
        let alice = User::new("alice");
        store
            .add(sample("double", "alice"), false, &alice, None)
            .await
            .unwrap();

        let err = store
            .delete("double", &User::new("mallory"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorised(_)));

        store.delete("double", &alice, None).await.unwrap();
        let err = store.delete("double", &alice, None).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cache(CacheError::NotFound { .. })
        ));
    }
}

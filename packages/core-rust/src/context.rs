use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::user::User;
use crate::value::Value;

/// Named side-output sink. Operations may append values under a key during
/// execution and read them back later in the same request.
pub trait Exporter: Send + Sync {
    /// Unique id of this exporter within a context.
    fn id(&self) -> &str;

    /// Appends a value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink rejects the value.
    fn add(&self, key: &str, value: Value) -> anyhow::Result<()>;

    /// Returns the values collected under `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink cannot be read.
    fn get(&self, key: &str) -> anyhow::Result<Vec<Value>>;
}

/// Per-request state: a unique job id, the caller's identity, the active
/// exporters, and a scratch config map.
///
/// Cloning a context generates a **fresh job id** and an **empty exporter
/// set**: a sub-request inherits the caller's identity and scratch config
/// but never shares side-output sinks or the parent's job id.
pub struct Context {
    job_id: Uuid,
    user: User,
    exporters: IndexMap<String, Arc<dyn Exporter>>,
    config: BTreeMap<String, Value>,
}

impl Context {
    /// Creates a context for the given user with a fresh job id.
    #[must_use]
    pub fn new(user: User) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user,
            exporters: IndexMap::new(),
            config: BTreeMap::new(),
        }
    }

    /// The unique job id of this request.
    #[must_use]
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// The caller's identity.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Registers an exporter under its own id, replacing any previous one.
    pub fn add_exporter(&mut self, exporter: Arc<dyn Exporter>) {
        self.exporters.insert(exporter.id().to_string(), exporter);
    }

    /// Looks up an exporter by id.
    #[must_use]
    pub fn exporter(&self, id: &str) -> Option<Arc<dyn Exporter>> {
        self.exporters.get(id).cloned()
    }

    /// Ids of the registered exporters, in registration order.
    pub fn exporter_ids(&self) -> impl Iterator<Item = &str> {
        self.exporters.keys().map(String::as_str)
    }

    /// Stores a scratch config entry.
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.config.insert(key.into(), value.into());
    }

    /// Reads a scratch config entry.
    #[must_use]
    pub fn config(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }
}

impl Clone for Context {
    /// Fresh job id, same user and scratch config, no exporters.
    fn clone(&self) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            user: self.user.clone(),
            exporters: IndexMap::new(),
            config: self.config.clone(),
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("job_id", &self.job_id)
            .field("user", &self.user)
            .field("exporters", &self.exporters.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullExporter;

    impl Exporter for NullExporter {
        fn id(&self) -> &str {
            "null"
        }
        fn add(&self, _key: &str, _value: Value) -> anyhow::Result<()> {
            Ok(())
        }
        fn get(&self, _key: &str) -> anyhow::Result<Vec<Value>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn clone_generates_fresh_job_id() {
        let ctx = Context::new(User::new("alice"));
        let child = ctx.clone();
        assert_ne!(ctx.job_id(), child.job_id());
        assert_eq!(child.user().id(), "alice");
    }

    #[test]
    fn clone_does_not_share_exporters() {
        let mut ctx = Context::new(User::new("alice"));
        ctx.add_exporter(Arc::new(NullExporter));
        assert!(ctx.exporter("null").is_some());

        let child = ctx.clone();
        assert!(child.exporter("null").is_none());
    }

    #[test]
    fn clone_carries_scratch_config() {
        let mut ctx = Context::new(User::new("alice"));
        ctx.set_config("depth", 3i64);
        let child = ctx.clone();
        assert_eq!(child.config("depth"), Some(&Value::Int(3)));
    }
}

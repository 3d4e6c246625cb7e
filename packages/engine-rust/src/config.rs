/// Engine-level configuration for an executor.
///
/// Plain values only; loading from files or the environment is the
/// embedder's concern.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Unique identifier for this executor. Must be unique across a
    /// federated storage instance.
    pub executor_id: String,
    /// Human-readable description, surfaced by administrative operations.
    pub description: String,
    /// Deadline for a top-level `execute` call in milliseconds. Elapsing
    /// cancels all in-flight work for the request.
    pub default_timeout_ms: u64,
    /// Authorization string granting administrative access to the
    /// named-operation store and federated administration. `None` disables
    /// admin access entirely.
    pub admin_auth: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor_id: String::new(),
            description: String::new(),
            default_timeout_ms: 30_000,
            admin_auth: None,
        }
    }
}

impl EngineConfig {
    /// Creates a config with the given executor id and defaults elsewhere.
    #[must_use]
    pub fn with_id(executor_id: impl Into<String>) -> Self {
        Self {
            executor_id: executor_id.into(),
            ..Self::default()
        }
    }
}

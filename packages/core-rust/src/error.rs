//! Error taxonomy for operation execution.
//!
//! Validation and authorization failures stay distinguishable from
//! internal/backend failures so callers can decide between fixing the
//! request and retrying, including across the federation boundary, where a
//! sub-executor's rejection propagates under its original variant.

use std::fmt;

use crate::cache::CacheError;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Aggregated missing-field failures for a whole chain.
///
/// Collected across every operation before any dispatch happens, so a
/// caller sees all problems at once instead of one per round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    errors: Vec<String>,
}

impl ValidationReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report from a single message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            errors: vec![message.into()],
        }
    }

    /// Records a missing required argument.
    pub fn push_missing(&mut self, op_id: &str, field: &str) {
        self.errors
            .push(format!("operation `{op_id}`: missing required argument `{field}`"));
    }

    /// Records a free-form validation failure.
    pub fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Whether the report holds no failures.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded failure messages.
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}

/// Failures surfaced by the executor and its subsystems.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Missing required operation arguments, aggregated across the chain.
    /// Recoverable: the caller can fix the request and resubmit.
    #[error("chain validation failed: {0}")]
    Validation(ValidationReport),

    /// No handler is registered for an operation id. Fatal to the chain.
    #[error("no handler registered for operation `{id}`")]
    Unsupported { id: String },

    /// A handler failed. Fatal to the chain; earlier operations' side
    /// effects are not rolled back.
    #[error("operation `{id}` failed: {source}")]
    Operation {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// Score/limiter or access-control rejection. Never retried.
    #[error("unauthorised: {0}")]
    Unauthorised(String),

    /// Duplicate-id insertion into the named-operation store or federated
    /// storage. Existing state is untouched.
    #[error("`{key}` already exists and overwrite is disabled")]
    Overwriting { key: String },

    /// Backing cache failed, or a required key was absent.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The top-level execution deadline elapsed.
    #[error("execution timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Escape hatch for handler plumbing; the executor rewraps this into
    /// [`EngineError::Operation`] at dispatch so callers always learn which
    /// operation failed.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

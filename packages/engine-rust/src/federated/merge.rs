//! Associative merge operators for federated results.

use std::sync::Arc;

use dashmap::DashMap;

use conflux_core::Value;

/// Associative binary merge applied left-to-right over per-executor
/// results, in the caller's requested id order.
pub trait MergeFunction: Send + Sync {
    /// Name callers select the operator by.
    fn name(&self) -> &'static str;

    /// Folds the next result into the accumulator.
    ///
    /// # Errors
    ///
    /// Returns an error when the operand types cannot be merged.
    fn merge(&self, acc: Value, next: Value) -> anyhow::Result<Value>;
}

/// String and array concatenation.
pub struct ConcatMerge;

impl MergeFunction for ConcatMerge {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn merge(&self, acc: Value, next: Value) -> anyhow::Result<Value> {
        match (acc, next) {
            (Value::String(mut left), Value::String(right)) => {
                left.push_str(&right);
                Ok(Value::String(left))
            }
            (Value::Array(mut left), Value::Array(right)) => {
                left.extend(right);
                Ok(Value::Array(left))
            }
            (acc, next) => anyhow::bail!(
                "concat cannot merge {acc:?} with {next:?}; operands must both be strings or arrays"
            ),
        }
    }
}

/// Gathers results into one array. The first result seeds the accumulator;
/// every later result is appended (an accumulator that is not yet an array
/// becomes a two-element one).
pub struct CollectMerge;

impl MergeFunction for CollectMerge {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn merge(&self, acc: Value, next: Value) -> anyhow::Result<Value> {
        match acc {
            Value::Array(mut items) => {
                items.push(next);
                Ok(Value::Array(items))
            }
            first => Ok(Value::Array(vec![first, next])),
        }
    }
}

/// Numeric addition; integers stay integral, mixing promotes to float.
pub struct SumMerge;

impl MergeFunction for SumMerge {
    fn name(&self) -> &'static str {
        "sum"
    }

    #[allow(clippy::cast_precision_loss)]
    fn merge(&self, acc: Value, next: Value) -> anyhow::Result<Value> {
        match (acc, next) {
            (Value::Int(left), Value::Int(right)) => Ok(Value::Int(left.saturating_add(right))),
            (Value::Int(left), Value::Float(right)) => Ok(Value::Float(left as f64 + right)),
            (Value::Float(left), Value::Int(right)) => Ok(Value::Float(left + right as f64)),
            (Value::Float(left), Value::Float(right)) => Ok(Value::Float(left + right)),
            (acc, next) => {
                anyhow::bail!("sum cannot merge {acc:?} with {next:?}; operands must be numeric")
            }
        }
    }
}

/// Registry of named merge operators.
///
/// [`MergeRegistry::default`] registers `concat`, `collect`, and `sum`.
pub struct MergeRegistry {
    merges: DashMap<String, Arc<dyn MergeFunction>>,
}

impl MergeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            merges: DashMap::new(),
        }
    }

    /// Registers an operator under its own name, replacing any previous one.
    pub fn register(&self, merge: Arc<dyn MergeFunction>) {
        self.merges.insert(merge.name().to_string(), merge);
    }

    /// Looks up an operator by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn MergeFunction>> {
        self.merges.get(name).map(|entry| entry.value().clone())
    }
}

impl Default for MergeRegistry {
    fn default() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(ConcatMerge));
        registry.register(Arc::new(CollectMerge));
        registry.register(Arc::new(SumMerge));
        registry
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

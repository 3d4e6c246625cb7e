use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Generic runtime value for operation arguments, inputs, and results.
///
/// Supports all JSON-compatible types. Serializes untagged, so the encoding
/// is plain JSON. Named-operation parameter substitution relies on this
/// round trip: a substituted template is reparsed, which coerces each
/// parameter value back into the right variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON integer (signed 64-bit).
    Int(i64),
    /// JSON floating-point (64-bit IEEE 754).
    Float(f64),
    /// JSON string (UTF-8).
    String(String),
    /// JSON array (ordered sequence of values).
    Array(Vec<Value>),
    /// JSON object (string keys to values).
    /// Uses `BTreeMap` for deterministic serialization order.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Returns `true` for `Value::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the string slice if this is a `String` value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the boolean if this is a `Bool` value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int` value.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the element slice if this is an `Array` value.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the entry map if this is a `Map` value.
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

/// Names the runtime type of a [`Value`], used for declared-parameter type
/// checks in named-operation templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Matches every value.
    Any,
    Bool,
    Int,
    /// Accepts `Int` as well: JSON numbers do not distinguish the two.
    Float,
    String,
    Array,
    Map,
}

impl ValueKind {
    /// Whether `value` is assignable to this declared kind.
    ///
    /// `Null` is assignable to every kind (an explicitly-null argument).
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        if value.is_null() {
            return true;
        }
        match self {
            ValueKind::Any => true,
            ValueKind::Bool => matches!(value, Value::Bool(_)),
            ValueKind::Int => matches!(value, Value::Int(_)),
            ValueKind::Float => matches!(value, Value::Int(_) | Value::Float(_)),
            ValueKind::String => matches!(value, Value::String(_)),
            ValueKind::Array => matches!(value, Value::Array(_)),
            ValueKind::Map => matches!(value, Value::Map(_)),
        }
    }
}

/// Converts any serializable value into a [`Value`] via its JSON encoding.
///
/// # Errors
///
/// Returns an error if `value` does not serialize to JSON-compatible data.
pub fn to_value<T: Serialize>(value: &T) -> Result<Value, serde_json::Error> {
    serde_json::to_value(value).and_then(serde_json::from_value)
}

/// Converts a [`Value`] into any deserializable type via its JSON encoding.
///
/// # Errors
///
/// Returns an error if the value does not match the target type's shape.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T, serde_json::Error> {
    serde_json::to_value(value).and_then(serde_json::from_value)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

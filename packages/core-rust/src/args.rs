//! Insertion-ordered, case-insensitive argument map for operations.

use std::fmt;

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::Value;

/// Ordered string-to-[`Value`] map with case-insensitive (ASCII) keys.
///
/// Lookup, removal, and containment ignore key case. Inserting under a key
/// that matches an existing entry case-insensitively replaces that entry's
/// value in place, keeping the stored key spelling and its position.
///
/// Equality is order-insensitive: two maps are equal when every entry of one
/// is matched case-insensitively by key, with an equal value, in the other.
/// An entry holding an explicit `Null` is not equal to the key being absent.
#[derive(Debug, Clone, Default)]
pub struct OpArgs {
    entries: IndexMap<String, Value>,
}

impl OpArgs {
    /// Creates an empty argument map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Index of the entry whose key matches `key` case-insensitively.
    fn position(&self, key: &str) -> Option<usize> {
        self.entries
            .keys()
            .position(|k| k.eq_ignore_ascii_case(key))
    }

    /// Inserts or replaces an entry, returning the previous value if any.
    ///
    /// A case-insensitive key match keeps the stored key spelling and the
    /// entry's position; otherwise the entry is appended.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        if let Some((_, slot)) = self
            .position(&key)
            .and_then(|index| self.entries.get_index_mut(index))
        {
            return Some(std::mem::replace(slot, value));
        }
        self.entries.insert(key, value);
        None
    }

    /// Case-insensitive lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key)
            .and_then(|index| self.entries.get_index(index).map(|(_, v)| v))
    }

    /// Case-insensitive containment check.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Removes an entry case-insensitively, returning its value.
    ///
    /// Preserves the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key)
            .and_then(|index| self.entries.shift_remove_index(index).map(|(_, v)| v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl PartialEq for OpArgs {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl FromIterator<(String, Value)> for OpArgs {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut args = OpArgs::new();
        for (key, value) in iter {
            args.insert(key, value);
        }
        args
    }
}

impl Serialize for OpArgs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OpArgs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ArgsVisitor;

        impl<'de> Visitor<'de> for ArgsVisitor {
            type Value = OpArgs;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of operation arguments")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OpArgs, A::Error> {
                let mut args = OpArgs::new();
                while let Some((key, value)) = access.next_entry::<String, Value>()? {
                    args.insert(key, value);
                }
                Ok(args)
            }
        }

        deserializer.deserialize_map(ArgsVisitor)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

use std::sync::Arc;

use dashmap::DashMap;

use super::handler::OperationHandler;

/// Registry mapping operation ids to handlers.
///
/// Ids are matched case-insensitively (ASCII). At most one handler exists
/// per id; registering `None` removes the mapping. Reads are lock-free;
/// mutation is rare and administrative.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn OperationHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Registers, replaces, or removes (`None`) the handler for `id`.
    pub fn add_handler(&self, id: &str, handler: Option<Arc<dyn OperationHandler>>) {
        let key = id.to_ascii_lowercase();
        match handler {
            Some(handler) => {
                self.handlers.insert(key, handler);
            }
            None => {
                self.handlers.remove(&key);
            }
        }
    }

    /// Looks up the handler for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn OperationHandler>> {
        self.handlers
            .get(&id.to_ascii_lowercase())
            .map(|entry| entry.value().clone())
    }

    /// Whether a handler is registered for `id`.
    #[must_use]
    pub fn is_supported(&self, id: &str) -> bool {
        self.handlers.contains_key(&id.to_ascii_lowercase())
    }

    /// The registered ids (lowercased), in no particular order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.handlers.iter().map(|e| e.key().clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use conflux_core::{Context, EngineResult, Operation, Value};

    use super::super::FnHandler;
    use super::*;

    fn noop() -> Arc<dyn OperationHandler> {
        Arc::new(FnHandler::new(
            |_op: Operation, _ctx: &Context| -> EngineResult<Option<Value>> { Ok(None) },
        ))
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = HandlerRegistry::new();
        registry.add_handler("Echo", Some(noop()));

        assert!(registry.is_supported("echo"));
        assert!(registry.is_supported("ECHO"));
        assert!(registry.get("eChO").is_some());
    }

    #[test]
    fn registering_none_removes_the_mapping() {
        let registry = HandlerRegistry::new();
        registry.add_handler("Echo", Some(noop()));
        assert!(registry.is_supported("echo"));

        registry.add_handler("ECHO", None);
        assert!(!registry.is_supported("echo"));
        assert!(registry.get("Echo").is_none());
    }

    #[test]
    fn registering_twice_replaces() {
        let registry = HandlerRegistry::new();
        registry.add_handler("Echo", Some(noop()));
        registry.add_handler("echo", Some(noop()));
        assert_eq!(registry.ids().len(), 1);
    }

    #[test]
    fn unregistered_id_is_unsupported() {
        let registry = HandlerRegistry::new();
        assert!(!registry.is_supported("missing"));
        assert!(registry.get("missing").is_none());
    }
}

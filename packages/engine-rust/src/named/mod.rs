//! Named-operation subsystem: stored, parameterized chain templates
//! referenced by name and expanded before dispatch.
//!
//! 1. **Details** (`detail`): the stored template, parameter declarations,
//!    and the substitute-then-reparse expansion
//! 2. **Store** (`cache`): access-controlled persistence over the cache
//!    capability
//! 3. **Resolver** (`resolver`): pre-execute hook splicing references
//! 4. **Handlers** (`handlers`): add / delete / list operations

pub mod cache;
pub mod detail;
pub mod handlers;
pub mod resolver;

pub use cache::NamedOperationCache;
pub use detail::{NamedOperationDetail, ParameterDetail};
pub use handlers::{
    AddNamedOperationHandler, DeleteNamedOperationHandler, GetAllNamedOperationsHandler,
};
pub use resolver::NamedOperationResolver;

use std::sync::Arc;

use crate::executor::Executor;

/// Operation id of a named-operation reference.
pub const NAMED_OPERATION: &str = "NamedOperation";
/// Operation id for storing a template.
pub const ADD_NAMED_OPERATION: &str = "AddNamedOperation";
/// Operation id for deleting a template.
pub const DELETE_NAMED_OPERATION: &str = "DeleteNamedOperation";
/// Operation id for listing visible templates.
pub const GET_ALL_NAMED_OPERATIONS: &str = "GetAllNamedOperations";

/// Registers the named-operation handlers and the resolver hook on an
/// executor, all sharing one store.
pub fn register_named_operations(executor: &Executor, store: &Arc<NamedOperationCache>) {
    executor.add_handler(
        ADD_NAMED_OPERATION,
        Some(Arc::new(AddNamedOperationHandler::new(store.clone()))),
    );
    executor.add_handler(
        DELETE_NAMED_OPERATION,
        Some(Arc::new(DeleteNamedOperationHandler::new(store.clone()))),
    );
    executor.add_handler(
        GET_ALL_NAMED_OPERATIONS,
        Some(Arc::new(GetAllNamedOperationsHandler::new(store.clone()))),
    );
    executor.add_hook(Arc::new(NamedOperationResolver::new(
        store.clone(),
        executor.config().admin_auth.clone(),
    )));
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

//! Operation execution core.
//!
//! 1. **Handlers** (`handler`): the per-operation-id dispatch contract
//! 2. **Registry** (`registry`): case-insensitive id → handler lookup
//! 3. **Executor** (`executor`): validation → hook pipeline → dispatch

pub mod executor;
pub mod handler;
pub mod registry;

pub use executor::{ExecutionOutcome, Executor};
pub use handler::{FnHandler, OperationHandler};
pub use registry::HandlerRegistry;

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

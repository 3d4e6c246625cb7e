//! Federated storage subsystem: sub-executors partitioned by access
//! policy, visibility-filtered routing, concurrent fan-out, and
//! order-preserving result merge.
//!
//! 1. **Access** (`access`): the visibility truth table
//! 2. **Storage** (`storage`): the policy → executors partition
//! 3. **Merge** (`merge`): named associative merge operators
//! 4. **Handlers** (`handler`): fan-out plus administration

pub mod access;
pub mod handler;
pub mod merge;
pub mod storage;

pub use access::FederatedAccess;
pub use handler::{FederatedHandler, GetAllExecutorIdsHandler, RemoveExecutorHandler};
pub use merge::{CollectMerge, ConcatMerge, MergeFunction, MergeRegistry, SumMerge};
pub use storage::FederatedExecutorStorage;

use std::sync::Arc;

use crate::executor::Executor;

/// Operation id for fan-out dispatch.
pub const FEDERATED: &str = "Federated";
/// Operation id for listing visible sub-executor ids.
pub const GET_ALL_EXECUTOR_IDS: &str = "GetAllExecutorIds";
/// Operation id for removing a sub-executor.
pub const REMOVE_EXECUTOR: &str = "RemoveExecutor";

/// Registers the federated handlers on an executor over one shared storage
/// and merge registry.
pub fn register_federation(
    executor: &Executor,
    storage: &Arc<FederatedExecutorStorage>,
    merges: &Arc<MergeRegistry>,
) {
    executor.add_handler(
        FEDERATED,
        Some(Arc::new(FederatedHandler::new(
            storage.clone(),
            merges.clone(),
        ))),
    );
    executor.add_handler(
        GET_ALL_EXECUTOR_IDS,
        Some(Arc::new(GetAllExecutorIdsHandler::new(storage.clone()))),
    );
    executor.add_handler(
        REMOVE_EXECUTOR,
        Some(Arc::new(RemoveExecutorHandler::new(storage.clone()))),
    );
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

//! Conflux Engine — pluggable operation execution: handler-registry
//! dispatch, a hook pipeline, named-operation templates, chain scoring,
//! and federated fan-out with order-preserving merge.

pub mod cache;
pub mod config;
pub mod executor;
pub mod export;
pub mod federated;
pub mod hook;
pub mod named;
pub mod score;

pub use cache::MemoryCache;
pub use config::EngineConfig;
pub use executor::{ExecutionOutcome, Executor, FnHandler, HandlerRegistry, OperationHandler};
pub use export::{ExportToSetHandler, GetSetExportHandler, SetExporter};
pub use federated::{
    register_federation, FederatedAccess, FederatedExecutorStorage, FederatedHandler,
    MergeFunction, MergeRegistry,
};
pub use hook::{Hook, TelemetryHook};
pub use named::{
    register_named_operations, NamedOperationCache, NamedOperationDetail, NamedOperationResolver,
    ParameterDetail,
};
pub use score::{ChainLimiterHook, ScoreChainHandler, ScoreConfig, ScoreResolver, Scorer};

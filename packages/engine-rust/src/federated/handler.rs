//! Fan-out dispatch across sub-executors with order-preserving merge.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;

use conflux_core::{
    Context, EngineError, EngineResult, Operation, OperationChain, ValidationReport, Value,
};

use crate::executor::{Executor, OperationHandler};

use super::merge::MergeRegistry;
use super::storage::FederatedExecutorStorage;

/// Dispatches a payload chain to a subset of sub-executors concurrently and
/// folds the results with a named merge operator.
///
/// Arguments: `operation` (the payload, a structured operation or chain),
/// `executorIds` (ordered target list; omitted means every default-enabled
/// visible executor), `mergeFunction` (operator name, default `collect`),
/// and `skipFailed` (bool, default false).
///
/// Branches run concurrently on the request task, so cancelling the
/// request cancels every branch. The merge folds left-to-right in the
/// caller's requested id order, never completion order, making the result
/// deterministic. A failed branch aborts the fan-out, with its original
/// error variant intact, unless `skipFailed` is set.
pub struct FederatedHandler {
    storage: Arc<FederatedExecutorStorage>,
    merges: Arc<MergeRegistry>,
}

impl FederatedHandler {
    #[must_use]
    pub fn new(storage: Arc<FederatedExecutorStorage>, merges: Arc<MergeRegistry>) -> Self {
        Self { storage, merges }
    }
}

/// Reads the optional ordered target-id list.
fn executor_ids(op: &Operation) -> EngineResult<Option<Vec<String>>> {
    match op.args().get("executorIds") {
        None => Ok(None),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(ToString::to_string).ok_or_else(|| {
                    EngineError::Validation(ValidationReport::message(
                        "`executorIds` must hold only strings",
                    ))
                })
            })
            .collect::<EngineResult<Vec<String>>>()
            .map(Some),
        Some(_) => Err(EngineError::Validation(ValidationReport::message(
            "`executorIds` must be an array of strings",
        ))),
    }
}

#[async_trait]
impl OperationHandler for FederatedHandler {
    fn required_args(&self) -> &[&str] {
        &["operation"]
    }

    fn accepts_input(&self) -> bool {
        true
    }

    async fn handle(
        &self,
        mut op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let Some(payload_value) = op.args().get("operation").cloned() else {
            return Err(EngineError::Validation(ValidationReport::message(
                "`operation` is required",
            )));
        };
        let mut payload = OperationChain::from_value(&payload_value).map_err(|err| {
            EngineError::Validation(ValidationReport::message(format!(
                "`operation` does not describe a chain: {err}"
            )))
        })?;

        let ids = executor_ids(&op)?;
        let merge_name = op
            .args()
            .get("mergeFunction")
            .and_then(Value::as_str)
            .unwrap_or("collect")
            .to_string();
        let Some(merge) = self.merges.get(&merge_name) else {
            return Err(EngineError::Validation(ValidationReport::message(format!(
                "unknown merge function `{merge_name}`"
            ))));
        };
        let skip_failed = op
            .args()
            .get("skipFailed")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let targets = self.storage.get(ctx.user(), ids.as_deref())?;

        // An input supplied to the federated operation seeds the payload's
        // first operation, unless it already carries an explicit one.
        if let Some(input) = op.take_input() {
            if let Some(first) = payload.first_operation_mut() {
                if first.input().is_none() {
                    first.set_input(Some(input));
                }
            }
        }

        tracing::debug!(
            targets = targets.len(),
            merge = %merge_name,
            skip_failed,
            "federated fan-out",
        );

        // Each branch gets a cloned context: fresh job id, same identity,
        // no shared exporters. `join_all` keeps the branches on this task,
        // so cancelling the request cancels all of them, and yields results
        // in target order regardless of completion order.
        let dispatches = targets.iter().map(|target| {
            let chain = payload.clone();
            let sub_ctx = ctx.clone();
            async move { target.execute(chain, sub_ctx).await }
        });
        let outcomes = join_all(dispatches).await;

        let mut merged: Option<Value> = None;
        for (target, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(outcome) => {
                    if let Some(value) = outcome.result {
                        merged = Some(match merged.take() {
                            None => value,
                            Some(acc) => {
                                merge.merge(acc, value).map_err(EngineError::Internal)?
                            }
                        });
                    }
                }
                Err(err) if skip_failed => {
                    tracing::warn!(
                        executor = %target.id(),
                        error = %err,
                        "skipping failed federated dispatch",
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(merged)
    }
}

// ---------------------------------------------------------------------------
// Administrative handlers
// ---------------------------------------------------------------------------

/// Lists the ids of every sub-executor visible to the caller.
pub struct GetAllExecutorIdsHandler {
    storage: Arc<FederatedExecutorStorage>,
}

impl GetAllExecutorIdsHandler {
    #[must_use]
    pub fn new(storage: Arc<FederatedExecutorStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OperationHandler for GetAllExecutorIdsHandler {
    async fn handle(
        &self,
        _op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let ids = self
            .storage
            .get_all_ids(ctx.user())
            .into_iter()
            .map(Value::from)
            .collect();
        Ok(Some(Value::Array(ids)))
    }
}

/// Removes a sub-executor from every bucket visible to the caller.
/// Arguments: `executorId`. Returns whether anything was removed.
pub struct RemoveExecutorHandler {
    storage: Arc<FederatedExecutorStorage>,
}

impl RemoveExecutorHandler {
    #[must_use]
    pub fn new(storage: Arc<FederatedExecutorStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl OperationHandler for RemoveExecutorHandler {
    fn required_args(&self) -> &[&str] {
        &["executorId"]
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let Some(id) = op.args().get("executorId").and_then(Value::as_str) else {
            return Err(EngineError::Validation(ValidationReport::message(
                "`executorId` must be a string",
            )));
        };
        let removed = self.storage.remove(id, ctx.user()).await?;
        Ok(Some(Value::Bool(removed)))
    }
}

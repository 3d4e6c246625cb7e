//! Telemetry hook: chain and operation logging via `tracing`.

use async_trait::async_trait;
use conflux_core::{Context, EngineResult, Operation, OperationChain, Value};

use super::Hook;

/// Logs chain shape, per-operation completion, and failures.
///
/// Purely observational: never rewrites the chain or the result.
#[derive(Debug, Clone, Default)]
pub struct TelemetryHook;

#[async_trait]
impl Hook for TelemetryHook {
    fn name(&self) -> &str {
        "telemetry"
    }

    async fn pre_execute(&self, chain: &mut OperationChain, ctx: &Context) -> EngineResult<()> {
        tracing::debug!(
            chain = %chain.id(),
            operations = chain.flatten().len(),
            user = %ctx.user().id(),
            "chain accepted",
        );
        Ok(())
    }

    async fn post_operation(
        &self,
        result: Option<Value>,
        op: &Operation,
        _ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        tracing::trace!(id = %op.id(), has_result = result.is_some(), "operation completed");
        Ok(result)
    }

    async fn on_failure(
        &self,
        state: EngineResult<Option<Value>>,
        chain: &OperationChain,
        ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        if let Err(err) = &state {
            tracing::warn!(
                chain = %chain.id(),
                job_id = %ctx.job_id(),
                error = %err,
                "chain failed",
            );
        }
        state
    }
}

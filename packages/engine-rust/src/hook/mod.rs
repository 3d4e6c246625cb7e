//! Cross-cutting hook pipeline around chain and operation execution.
//!
//! A [`Hook`] carries two invocation scopes on one interface:
//!
//! - **Request scope**: `pre_execute` / `post_execute` / `on_failure`, once
//!   per chain.
//! - **Operation scope**: `pre_operation` / `post_operation`, once per
//!   operation within the chain.
//!
//! The executor runs pre/post methods in registration order and
//! `on_failure` in reverse registration order. Every method has a safe
//! no-op default.

pub mod telemetry;

pub use telemetry::TelemetryHook;

use async_trait::async_trait;
use conflux_core::{Context, EngineResult, Operation, OperationChain, Value};

/// Pre/post/on-failure interceptor around chain and operation execution.
///
/// Hooks must be side-effect-isolated per request and must not retain
/// references to the [`Context`] beyond the call.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Name shown in logs and diagnostics.
    fn name(&self) -> &str;

    /// Runs once before dispatch. May rewrite the chain in place; an error
    /// aborts the request (remaining hooks and dispatch are skipped).
    async fn pre_execute(&self, _chain: &mut OperationChain, _ctx: &Context) -> EngineResult<()> {
        Ok(())
    }

    /// Runs once after a successful dispatch. May transform the result.
    async fn post_execute(
        &self,
        result: Option<Value>,
        _chain: &OperationChain,
        _ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        Ok(result)
    }

    /// Runs once after a failed dispatch, in reverse registration order.
    ///
    /// Receives the current outcome state and returns the next one: keep
    /// the error (default), replace it, or convert the failure into a
    /// result. The first-registered hook runs last and its verdict wins.
    async fn on_failure(
        &self,
        state: EngineResult<Option<Value>>,
        _chain: &OperationChain,
        _ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        state
    }

    /// Runs before each operation dispatch. May rewrite the operation.
    async fn pre_operation(&self, _op: &mut Operation, _ctx: &Context) -> EngineResult<()> {
        Ok(())
    }

    /// Runs after each operation dispatch. May transform the result.
    async fn post_operation(
        &self,
        result: Option<Value>,
        _op: &Operation,
        _ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        Ok(result)
    }
}

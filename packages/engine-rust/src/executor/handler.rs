use async_trait::async_trait;
use conflux_core::{Context, EngineResult, Operation, Value};

use super::executor::Executor;

/// Handles one operation id.
///
/// Handlers are registered with a [`HandlerRegistry`](super::HandlerRegistry)
/// and invoked by the executor during dispatch. A handler receives the
/// executor itself so composite operations (federation, scoring, named
/// operations) can re-enter execution.
///
/// Used as `Arc<dyn OperationHandler>`.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Argument names that must be present for the operation to validate.
    fn required_args(&self) -> &[&str] {
        &[]
    }

    /// Whether this handler consumes an input. When true and the operation
    /// carries no explicit input, the executor threads the previous
    /// operation's result into the input slot.
    fn accepts_input(&self) -> bool {
        false
    }

    /// Executes the operation.
    ///
    /// # Errors
    ///
    /// [`EngineError::Internal`](conflux_core::EngineError::Internal) is
    /// rewrapped by the executor into an operation-level failure naming the
    /// operation id; every other variant propagates unchanged.
    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        executor: &Executor,
    ) -> EngineResult<Option<Value>>;
}

/// Adapter turning a synchronous closure into an [`OperationHandler`].
///
/// Convenient for simple handlers and tests:
///
/// ```
/// use conflux_core::Context;
/// use conflux_engine::executor::FnHandler;
///
/// let echo = FnHandler::new(|op, _ctx: &Context| Ok(op.args().get("msg").cloned()))
///     .with_required_args(&["msg"]);
/// let _ = echo;
/// ```
pub struct FnHandler<F> {
    f: F,
    required: Vec<&'static str>,
    input_slot: bool,
}

impl<F> FnHandler<F>
where
    F: Fn(Operation, &Context) -> EngineResult<Option<Value>> + Send + Sync,
{
    /// Wraps a closure as a handler with no required arguments.
    #[must_use]
    pub fn new(f: F) -> Self {
        Self {
            f,
            required: Vec::new(),
            input_slot: false,
        }
    }

    /// Declares required argument names.
    #[must_use]
    pub fn with_required_args(mut self, args: &[&'static str]) -> Self {
        self.required = args.to_vec();
        self
    }

    /// Declares that the handler consumes an input.
    #[must_use]
    pub fn with_input_slot(mut self) -> Self {
        self.input_slot = true;
        self
    }
}

#[async_trait]
impl<F> OperationHandler for FnHandler<F>
where
    F: Fn(Operation, &Context) -> EngineResult<Option<Value>> + Send + Sync,
{
    fn required_args(&self) -> &[&str] {
        &self.required
    }

    fn accepts_input(&self) -> bool {
        self.input_slot
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        (self.f)(op, ctx)
    }
}

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;
use tracing::Instrument;
use uuid::Uuid;

use conflux_core::{
    Context, EngineError, EngineResult, OpElement, OperationChain, ValidationReport, Value,
};

use crate::config::EngineConfig;
use crate::hook::Hook;

use super::handler::OperationHandler;
use super::registry::HandlerRegistry;

/// Result envelope of a top-level [`Executor::execute`] call.
///
/// The job id is always present, even for operations with no output.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Unique id of the request, taken from its [`Context`].
    pub job_id: Uuid,
    /// Final result, after post-execute hooks.
    pub result: Option<Value>,
}

/// Orchestrates chain execution: validation, the hook pipeline, and
/// per-operation dispatch through the handler registry.
///
/// Safe for concurrent use behind an `Arc`: the registry and hook list
/// support concurrent reads, and each `execute` call runs on its caller's
/// task with no shared mutable request state.
pub struct Executor {
    config: EngineConfig,
    registry: HandlerRegistry,
    hooks: ArcSwap<Vec<Arc<dyn Hook>>>,
}

impl Executor {
    /// Creates an executor with no handlers and no hooks.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            registry: HandlerRegistry::new(),
            hooks: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// The executor id, unique within a federated storage instance.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.config.executor_id
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The handler registry.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Registers, replaces, or removes (`None`) the handler for `id`.
    pub fn add_handler(&self, id: &str, handler: Option<Arc<dyn OperationHandler>>) {
        self.registry.add_handler(id, handler);
    }

    /// Whether a handler is registered for `id`.
    #[must_use]
    pub fn is_supported(&self, id: &str) -> bool {
        self.registry.is_supported(id)
    }

    /// Appends a hook. Hooks run in registration order for pre/post and in
    /// reverse registration order on failure.
    pub fn add_hook(&self, hook: Arc<dyn Hook>) {
        self.hooks.rcu(|current| {
            let mut hooks = Vec::clone(current);
            hooks.push(hook.clone());
            hooks
        });
    }

    /// Replaces the whole hook list.
    pub fn set_hooks(&self, hooks: Vec<Arc<dyn Hook>>) {
        self.hooks.store(Arc::new(hooks));
    }

    /// Executes a chain (or a single operation) under this executor's
    /// deadline and returns the result together with the request's job id.
    ///
    /// # Errors
    ///
    /// See [`EngineError`] for the taxonomy. Validation failures aggregate
    /// every missing argument across the chain; a handler failure aborts the
    /// remaining chain without rolling back earlier side effects.
    pub async fn execute(
        &self,
        chain: impl Into<OperationChain>,
        ctx: Context,
    ) -> EngineResult<ExecutionOutcome> {
        let chain = chain.into();
        let job_id = ctx.job_id();
        let timeout_ms = self.config.default_timeout_ms;
        let span = tracing::info_span!(
            "execute",
            executor = %self.id(),
            job_id = %job_id,
            chain = %chain.id(),
        );

        let result = async {
            match tokio::time::timeout(
                Duration::from_millis(timeout_ms),
                self.execute_inner(chain, &ctx),
            )
            .await
            {
                Ok(result) => result,
                Err(_elapsed) => Err(EngineError::Timeout { timeout_ms }),
            }
        }
        .instrument(span)
        .await?;

        Ok(ExecutionOutcome { job_id, result })
    }

    /// Validation, hook pipeline, and dispatch for one request.
    async fn execute_inner(
        &self,
        mut chain: OperationChain,
        ctx: &Context,
    ) -> EngineResult<Option<Value>> {
        let hooks = self.hooks.load_full();

        self.validate(&chain)?;

        // Pre-execute hooks may rewrite the chain in place; the first error
        // short-circuits the remaining hooks and dispatch.
        for hook in hooks.iter() {
            hook.pre_execute(&mut chain, ctx).await?;
        }

        let dispatched = self
            .dispatch_elements(chain.operations(), ctx, &hooks, None)
            .await;

        match dispatched {
            Ok(mut result) => {
                for hook in hooks.iter() {
                    result = hook.post_execute(result, &chain, ctx).await?;
                }
                Ok(result)
            }
            Err(err) => {
                // Reverse registration order; the first-registered hook runs
                // last and its verdict wins.
                let mut state: EngineResult<Option<Value>> = Err(err);
                for hook in hooks.iter().rev() {
                    state = hook.on_failure(state, &chain, ctx).await;
                }
                state
            }
        }
    }

    /// Checks required arguments for every operation whose handler is
    /// registered, aggregating all failures into one report.
    fn validate(&self, chain: &OperationChain) -> EngineResult<()> {
        let mut report = ValidationReport::new();
        for op in chain.flatten() {
            if let Some(handler) = self.registry.get(op.id()) {
                for field in handler.required_args() {
                    if !op.args().contains(field) {
                        report.push_missing(op.id(), field);
                    }
                }
            }
        }
        if report.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(report))
        }
    }

    /// Dispatches elements in sequence order, flattening nested chains as
    /// encountered and threading each result into the next operation's
    /// input slot when the handler consumes one.
    fn dispatch_elements<'a>(
        &'a self,
        elements: &'a [OpElement],
        ctx: &'a Context,
        hooks: &'a [Arc<dyn Hook>],
        prev: Option<Value>,
    ) -> BoxFuture<'a, EngineResult<Option<Value>>> {
        Box::pin(async move {
            let mut prev = prev;
            for element in elements {
                match element {
                    OpElement::Chain(nested) => {
                        prev = self
                            .dispatch_elements(nested.operations(), ctx, hooks, prev.take())
                            .await?;
                    }
                    OpElement::Op(op) => {
                        let Some(handler) = self.registry.get(op.id()) else {
                            return Err(EngineError::Unsupported {
                                id: op.id().to_string(),
                            });
                        };

                        let mut op = op.clone();
                        for hook in hooks {
                            hook.pre_operation(&mut op, ctx).await?;
                        }
                        if handler.accepts_input() && op.input().is_none() {
                            op.set_input(prev.take());
                        }

                        let id = op.id().to_string();
                        let invoked = op.clone();
                        let mut result = match handler.handle(op, ctx, self).await {
                            Ok(result) => result,
                            Err(EngineError::Internal(source)) => {
                                return Err(EngineError::Operation { id, source });
                            }
                            Err(other) => return Err(other),
                        };

                        for hook in hooks {
                            result = hook.post_operation(result, &invoked, ctx).await?;
                        }
                        prev = result;
                    }
                }
            }
            Ok(prev)
        })
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("id", &self.id())
            .field("handlers", &self.registry.ids().len())
            .finish_non_exhaustive()
    }
}

// Dispatch behavior is covered by the integration tests in the parent
// module; `Operation` invariants are covered in `conflux-core`.

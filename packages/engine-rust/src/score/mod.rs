//! Score subsystem: integer chain costs checked against per-caller budgets.
//!
//! 1. **Scorer** (`scorer`): static id-prefix weight table, pluggable
//!    resolvers, recursive chain summation
//! 2. **Limiter** (`limiter`): pre-execute hook enforcing the budget
//! 3. **Handler** (`handler`): the `ScoreChain` operation surface

pub mod handler;
pub mod limiter;
pub mod scorer;

pub use handler::ScoreChainHandler;
pub use limiter::ChainLimiterHook;
pub use scorer::{
    NamedOperationScoreResolver, Resolution, ScoreConfig, ScoreConfigError, ScoreResolver, Scorer,
    DEFAULT_OPERATION_SCORE,
};

/// Operation id for scoring a structured chain.
pub const SCORE_CHAIN: &str = "ScoreChain";

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod integration_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use conflux_core::{Context, EngineError, EngineResult, Operation, User, Value};

    use crate::cache::MemoryCache;
    use crate::config::EngineConfig;
    use crate::executor::{Executor, FnHandler};
    use crate::named::{
        register_named_operations, NamedOperationCache, NAMED_OPERATION,
    };

    use super::*;

    /// Limiter plus resolver wired together: a named-operation reference is
    /// priced through its stored score, and the budget gates execution.
    #[tokio::test]
    async fn named_reference_is_priced_through_its_stored_score() {
        let executor = Executor::new(EngineConfig::with_id("test"));
        executor.add_handler(
            "Echo",
            Some(Arc::new(FnHandler::new(
                |op: Operation, _ctx: &Context| -> EngineResult<Option<Value>> {
                    Ok(op.args().get("msg").cloned())
                },
            ))),
        );

        let store = Arc::new(NamedOperationCache::new(Arc::new(MemoryCache::new())));

        let config = ScoreConfig::new(
            Vec::new(),
            HashMap::from([("basic".to_string(), 4)]),
            0,
        )
        .unwrap();
        let scorer = Arc::new(Scorer::new(config));
        scorer.add_resolver(
            NAMED_OPERATION,
            Arc::new(NamedOperationScoreResolver::new(store.clone(), None)),
        );
        executor.add_hook(Arc::new(ChainLimiterHook::new(scorer)));
        register_named_operations(&executor, &store);

        let alice = User::with_auths("alice", ["basic"]);
        executor
            .execute(
                Operation::new("AddNamedOperation")
                    .arg("operationName", "pricy")
                    .arg("operationChain", r#"[{"id":"Echo","msg":"hi"}]"#)
                    .arg("score", 3i64),
                Context::new(alice.clone()),
            )
            .await
            .unwrap();

        // One reference costs 3: inside the budget of 4.
        let outcome = executor
            .execute(
                Operation::new(NAMED_OPERATION).arg("name", "pricy"),
                Context::new(alice.clone()),
            )
            .await
            .unwrap();
        assert_eq!(outcome.result, Some(Value::from("hi")));

        // Two references cost 6: over budget, rejected before dispatch.
        let chain = conflux_core::OperationChain::new(vec![
            Operation::new(NAMED_OPERATION).arg("name", "pricy").into(),
            Operation::new(NAMED_OPERATION).arg("name", "pricy").into(),
        ]);
        let err = executor
            .execute(chain, Context::new(alice))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorised(_)));
    }
}

//! Handler exposing chain scoring as an operation.

use std::sync::Arc;

use async_trait::async_trait;

use conflux_core::{
    Context, EngineError, EngineResult, Operation, OperationChain, ValidationReport, Value,
};

use crate::executor::{Executor, OperationHandler};

use super::scorer::Scorer;

/// Computes the score of a structured chain supplied in the `operations`
/// argument and returns it as an integer.
pub struct ScoreChainHandler {
    scorer: Arc<Scorer>,
}

impl ScoreChainHandler {
    #[must_use]
    pub fn new(scorer: Arc<Scorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl OperationHandler for ScoreChainHandler {
    fn required_args(&self) -> &[&str] {
        &["operations"]
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let Some(value) = op.args().get("operations") else {
            return Err(EngineError::Validation(ValidationReport::message(
                "`operations` is required",
            )));
        };
        let chain = OperationChain::from_value(value).map_err(|err| {
            EngineError::Validation(ValidationReport::message(format!(
                "`operations` does not describe a chain: {err}"
            )))
        })?;
        let score = self.scorer.score(&chain, ctx).await?;
        Ok(Some(Value::Int(score)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

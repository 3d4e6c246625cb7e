//! Pre-execute hook rejecting chains that exceed the caller's budget.

use std::sync::Arc;

use async_trait::async_trait;

use conflux_core::{Context, EngineError, EngineResult, OperationChain};

use crate::hook::Hook;

use super::scorer::Scorer;

/// Scores the incoming chain and rejects it when the cost exceeds the
/// caller's authorized maximum.
///
/// Register this hook before the named-operation resolver so references are
/// priced through their [`ScoreResolver`](super::ScoreResolver) rather than
/// their expansion.
pub struct ChainLimiterHook {
    scorer: Arc<Scorer>,
}

impl ChainLimiterHook {
    #[must_use]
    pub fn new(scorer: Arc<Scorer>) -> Self {
        Self { scorer }
    }
}

#[async_trait]
impl Hook for ChainLimiterHook {
    fn name(&self) -> &str {
        "chain-limiter"
    }

    async fn pre_execute(&self, chain: &mut OperationChain, ctx: &Context) -> EngineResult<()> {
        let score = self.scorer.score(chain, ctx).await?;
        let limit = self.scorer.config().limit_for(ctx.user());
        if score > limit {
            return Err(EngineError::Unauthorised(format!(
                "chain score {score} exceeds the caller's authorised limit {limit}"
            )));
        }
        tracing::debug!(score, limit, user = %ctx.user().id(), "chain within budget");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

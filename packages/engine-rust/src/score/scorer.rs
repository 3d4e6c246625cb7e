//! Chain scoring: a static id-prefix weight table plus pluggable
//! per-operation resolvers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use conflux_core::{Context, EngineResult, OpElement, Operation, OperationChain, User, Value};

use crate::named::NamedOperationCache;

/// Weight applied when no table entry matches an operation id.
pub const DEFAULT_OPERATION_SCORE: i64 = 1;

/// Configuration-time error for malformed score tables.
#[derive(Debug, thiserror::Error)]
pub enum ScoreConfigError {
    /// A general prefix was configured after one of its extensions. The
    /// table must be ordered least specific first so that the last matching
    /// entry is always the most specific one.
    #[error("score for `{general}` must be configured before `{specific}`")]
    MisorderedEntries { general: String, specific: String },
}

/// Static scoring tables.
///
/// `op_scores` maps operation-id prefixes (matched case-insensitively) to
/// weights, ordered least specific to most specific; the last matching
/// entry wins. `auth_scores` maps authorization strings to budgets; a
/// caller's budget is the maximum over held auths, or `no_auth_score` when
/// none is configured.
#[derive(Debug, Clone, Default)]
pub struct ScoreConfig {
    op_scores: Vec<(String, i64)>,
    auth_scores: HashMap<String, i64>,
    no_auth_score: i64,
}

impl ScoreConfig {
    /// Builds and checks the tables.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreConfigError::MisorderedEntries`] if a general prefix
    /// appears after a more specific extension of it.
    pub fn new(
        op_scores: Vec<(String, i64)>,
        auth_scores: HashMap<String, i64>,
        no_auth_score: i64,
    ) -> Result<Self, ScoreConfigError> {
        let op_scores: Vec<(String, i64)> = op_scores
            .into_iter()
            .map(|(prefix, score)| (prefix.to_ascii_lowercase(), score))
            .collect();

        for i in 0..op_scores.len() {
            for j in (i + 1)..op_scores.len() {
                let (earlier, _) = &op_scores[i];
                let (later, _) = &op_scores[j];
                if earlier != later && earlier.starts_with(later.as_str()) {
                    return Err(ScoreConfigError::MisorderedEntries {
                        general: later.clone(),
                        specific: earlier.clone(),
                    });
                }
            }
        }

        Ok(Self {
            op_scores,
            auth_scores,
            no_auth_score,
        })
    }

    /// Weight of one operation id: the last matching prefix entry, or
    /// [`DEFAULT_OPERATION_SCORE`] when none matches.
    #[must_use]
    pub fn op_score(&self, id: &str) -> i64 {
        let id = id.to_ascii_lowercase();
        self.op_scores
            .iter()
            .rev()
            .find(|(prefix, _)| id.starts_with(prefix.as_str()))
            .map_or(DEFAULT_OPERATION_SCORE, |(_, score)| *score)
    }

    /// The caller's authorized budget: the maximum over configured auths the
    /// caller holds, or the no-auth boundary when none is configured.
    #[must_use]
    pub fn limit_for(&self, user: &User) -> i64 {
        user.op_auths()
            .iter()
            .filter_map(|auth| self.auth_scores.get(auth).copied())
            .max()
            .unwrap_or(self.no_auth_score)
    }
}

/// Verdict of a [`ScoreResolver`].
#[derive(Debug)]
pub enum Resolution {
    /// Use this score instead of the static table.
    Score(i64),
    /// Score these elements in place of the operation.
    Expand(Vec<OpElement>),
    /// No verdict; the operation contributes zero.
    Unscored,
}

/// Extension point replacing the static table lookup for one operation id.
#[async_trait]
pub trait ScoreResolver: Send + Sync {
    /// Resolves the score contribution of `op`.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; an unresolvable score should return
    /// [`Resolution::Unscored`] instead of an error.
    async fn resolve(&self, op: &Operation, ctx: &Context) -> EngineResult<Resolution>;
}

/// Computes the integer cost of a chain.
///
/// Sums the weight of every operation, recursing into nested chains; an
/// empty operation list contributes zero. Operations with a registered
/// resolver use its verdict instead of the static table.
pub struct Scorer {
    config: ScoreConfig,
    resolvers: DashMap<String, Arc<dyn ScoreResolver>>,
}

impl Scorer {
    /// Creates a scorer with no resolvers.
    #[must_use]
    pub fn new(config: ScoreConfig) -> Self {
        Self {
            config,
            resolvers: DashMap::new(),
        }
    }

    /// The static tables.
    #[must_use]
    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    /// Registers a resolver for an operation id (case-insensitive).
    pub fn add_resolver(&self, id: &str, resolver: Arc<dyn ScoreResolver>) {
        self.resolvers.insert(id.to_ascii_lowercase(), resolver);
    }

    /// Scores a whole chain.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures.
    pub async fn score(&self, chain: &OperationChain, ctx: &Context) -> EngineResult<i64> {
        let mut total: i64 = 0;
        let mut stack: Vec<OpElement> = chain.operations().to_vec();
        while let Some(element) = stack.pop() {
            match element {
                OpElement::Chain(nested) => stack.extend(nested.into_operations()),
                OpElement::Op(op) => {
                    let resolver = self
                        .resolvers
                        .get(&op.id().to_ascii_lowercase())
                        .map(|entry| entry.value().clone());
                    match resolver {
                        Some(resolver) => match resolver.resolve(&op, ctx).await? {
                            Resolution::Score(score) => total = total.saturating_add(score),
                            Resolution::Expand(elements) => stack.extend(elements),
                            Resolution::Unscored => {}
                        },
                        None => total = total.saturating_add(self.config.op_score(op.id())),
                    }
                }
            }
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// NamedOperationScoreResolver
// ---------------------------------------------------------------------------

/// Default resolver for `NamedOperation` references.
///
/// Uses the referenced detail's own score when one is configured; otherwise
/// expands the template with default parameters and scores the expansion.
/// A missing or invisible detail contributes zero rather than failing the
/// scoring pass; resolution proper will surface the real error.
pub struct NamedOperationScoreResolver {
    store: Arc<NamedOperationCache>,
    admin_auth: Option<String>,
}

impl NamedOperationScoreResolver {
    #[must_use]
    pub fn new(store: Arc<NamedOperationCache>, admin_auth: Option<String>) -> Self {
        Self { store, admin_auth }
    }
}

#[async_trait]
impl ScoreResolver for NamedOperationScoreResolver {
    async fn resolve(&self, op: &Operation, ctx: &Context) -> EngineResult<Resolution> {
        let Some(name) = op.args().get("name").and_then(Value::as_str) else {
            return Ok(Resolution::Unscored);
        };
        let Ok(detail) = self
            .store
            .get(name, ctx.user(), self.admin_auth.as_deref())
            .await
        else {
            return Ok(Resolution::Unscored);
        };
        if let Some(score) = detail.score {
            return Ok(Resolution::Score(score));
        }
        match detail.expand(&BTreeMap::new()) {
            Ok(elements) => Ok(Resolution::Expand(elements)),
            Err(_) => Ok(Resolution::Unscored),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

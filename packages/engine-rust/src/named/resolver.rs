//! Pre-execute hook that expands named-operation references in place.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use conflux_core::{
    first_operation_mut, Context, EngineError, EngineResult, OpElement, OperationChain,
    ValidationReport, Value,
};

use crate::hook::Hook;

use super::cache::NamedOperationCache;
use super::NAMED_OPERATION;

/// Bound on reference-inside-reference splicing. Store-time validation
/// rejects nested references, but an externally-seeded cache could still
/// hold them.
const MAX_RESOLUTION_DEPTH: u32 = 25;

/// Rewrites every `NamedOperation` reference in a chain into its stored,
/// parameter-substituted template before dispatch.
///
/// Resolution is a no-op on chains without references. Each spliced chain
/// is a fresh expansion, so stored templates are never aliased across
/// requests.
pub struct NamedOperationResolver {
    cache: Arc<NamedOperationCache>,
    admin_auth: Option<String>,
}

impl NamedOperationResolver {
    /// Creates a resolver over the given store.
    #[must_use]
    pub fn new(cache: Arc<NamedOperationCache>, admin_auth: Option<String>) -> Self {
        Self { cache, admin_auth }
    }

    fn resolve_elements<'a>(
        &'a self,
        elements: Vec<OpElement>,
        ctx: &'a Context,
        depth: u32,
    ) -> BoxFuture<'a, EngineResult<Vec<OpElement>>> {
        Box::pin(async move {
            if depth > MAX_RESOLUTION_DEPTH {
                return Err(EngineError::Internal(anyhow::anyhow!(
                    "named-operation resolution exceeded {MAX_RESOLUTION_DEPTH} levels"
                )));
            }

            let mut out = Vec::with_capacity(elements.len());
            for element in elements {
                match element {
                    OpElement::Chain(mut chain) => {
                        let nested = std::mem::take(chain.operations_mut());
                        *chain.operations_mut() =
                            self.resolve_elements(nested, ctx, depth + 1).await?;
                        out.push(OpElement::Chain(chain));
                    }
                    OpElement::Op(mut op) if op.id().eq_ignore_ascii_case(NAMED_OPERATION) => {
                        let Some(name) = op
                            .args()
                            .get("name")
                            .and_then(Value::as_str)
                            .map(ToString::to_string)
                        else {
                            return Err(EngineError::Validation(ValidationReport::message(
                                "named-operation reference is missing its `name` argument",
                            )));
                        };
                        let detail = self
                            .cache
                            .get(&name, ctx.user(), self.admin_auth.as_deref())
                            .await?;

                        let supplied = match op.args().get("parameters") {
                            None => BTreeMap::new(),
                            Some(Value::Map(entries)) => entries.clone(),
                            Some(_) => {
                                return Err(EngineError::Validation(ValidationReport::message(
                                    format!("named operation `{name}`: `parameters` must be a map"),
                                )));
                            }
                        };

                        let expanded = detail.expand(&supplied)?;
                        let mut spliced =
                            self.resolve_elements(expanded, ctx, depth + 1).await?;

                        // A caller-supplied input flows to the first spliced
                        // operation only, and never overwrites an explicit one.
                        if let Some(input) = op.take_input() {
                            if let Some(first) = first_operation_mut(&mut spliced) {
                                if first.input().is_none() {
                                    first.set_input(Some(input));
                                }
                            }
                        }

                        tracing::debug!(
                            name = %name,
                            operations = spliced.len(),
                            "resolved named operation",
                        );
                        out.extend(spliced);
                    }
                    other => out.push(other),
                }
            }
            Ok(out)
        })
    }
}

#[async_trait]
impl Hook for NamedOperationResolver {
    fn name(&self) -> &str {
        "named-operation-resolver"
    }

    async fn pre_execute(&self, chain: &mut OperationChain, ctx: &Context) -> EngineResult<()> {
        let elements = std::mem::take(chain.operations_mut());
        *chain.operations_mut() = self.resolve_elements(elements, ctx, 0).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use conflux_core::{Operation, User};
    use indexmap::IndexMap;

    use crate::cache::MemoryCache;
    use crate::named::detail::{NamedOperationDetail, ParameterDetail};

    use super::*;

    async fn store_with(details: Vec<NamedOperationDetail>) -> Arc<NamedOperationCache> {
        let store = Arc::new(NamedOperationCache::new(Arc::new(MemoryCache::new())));
        for detail in details {
            let creator = User::new(detail.creator_id.clone());
            store.add(detail, false, &creator, None).await.unwrap();
        }
        store
    }

    fn double_detail() -> NamedOperationDetail {
        NamedOperationDetail {
            operation_name: "double".to_string(),
            operations: r#"[{"id":"Echo","msg":"${v}${v}"}]"#.to_string(),
            description: String::new(),
            creator_id: "alice".to_string(),
            read_access_roles: Vec::new(),
            write_access_roles: Vec::new(),
            parameters: IndexMap::from([(
                "v".to_string(),
                ParameterDetail {
                    default_value: Some(Value::from("a")),
                    value_kind: conflux_core::ValueKind::String,
                    required: true,
                    description: String::new(),
                },
            )]),
            score: None,
            input_kind: None,
        }
    }

    fn reference(name: &str) -> Operation {
        Operation::new(NAMED_OPERATION).arg("name", name)
    }

    #[tokio::test]
    async fn resolution_is_a_no_op_without_references() {
        let resolver = NamedOperationResolver::new(store_with(vec![]).await, None);
        let original = OperationChain::new(vec![
            Operation::new("Echo").arg("msg", "hi").into(),
            OperationChain::new(vec![Operation::new("Other").into()]).into(),
        ]);
        let mut chain = original.clone();
        resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap();
        assert_eq!(chain, original);
    }

    #[tokio::test]
    async fn resolves_reference_with_default_parameters() {
        let resolver =
            NamedOperationResolver::new(store_with(vec![double_detail()]).await, None);
        let mut chain: OperationChain = reference("double").into();
        resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap();

        let expected = Operation::new("Echo").arg("msg", "aa");
        assert_eq!(chain.operations(), &[OpElement::Op(expected)]);
    }

    #[tokio::test]
    async fn resolves_reference_with_supplied_parameters() {
        let resolver =
            NamedOperationResolver::new(store_with(vec![double_detail()]).await, None);
        let mut op = reference("double");
        op.args_mut().insert(
            "parameters",
            Value::Map(BTreeMap::from([("v".to_string(), Value::from("xy"))])),
        );
        let mut chain: OperationChain = op.into();
        resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap();

        let expected = Operation::new("Echo").arg("msg", "xyxy");
        assert_eq!(chain.operations(), &[OpElement::Op(expected)]);
    }

    #[tokio::test]
    async fn resolves_references_inside_nested_chains() {
        let resolver =
            NamedOperationResolver::new(store_with(vec![double_detail()]).await, None);
        let mut chain = OperationChain::new(vec![OperationChain::new(vec![
            reference("double").into(),
        ])
        .into()]);
        resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap();

        let flat: Vec<&str> = chain.flatten().iter().map(|op| op.id()).collect();
        assert_eq!(flat, vec!["Echo"]);
    }

    #[tokio::test]
    async fn reference_input_flows_to_first_spliced_operation() {
        let mut detail = double_detail();
        detail.operations =
            r#"[{"id":"First","msg":"${v}"},{"id":"Second","msg":"${v}"}]"#.to_string();
        let resolver = NamedOperationResolver::new(store_with(vec![detail]).await, None);

        let mut chain: OperationChain = reference("double").with_input("seed").into();
        resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap();

        let ops = chain.flatten();
        assert_eq!(ops[0].input(), Some(&Value::from("seed")));
        assert_eq!(ops[1].input(), None);
    }

    #[tokio::test]
    async fn unknown_reference_surfaces_cache_error() {
        let resolver = NamedOperationResolver::new(store_with(vec![]).await, None);
        let mut chain: OperationChain = reference("ghost").into();
        let err = resolver
            .pre_execute(&mut chain, &Context::new(User::new("alice")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Cache(_)));
    }

    #[tokio::test]
    async fn invisible_reference_is_rejected() {
        let mut detail = double_detail();
        detail.creator_id = "owner".to_string();
        let resolver = NamedOperationResolver::new(store_with(vec![detail]).await, None);

        let mut chain: OperationChain = reference("double").into();
        let err = resolver
            .pre_execute(&mut chain, &Context::new(User::new("mallory")))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unauthorised(_)));
    }
}

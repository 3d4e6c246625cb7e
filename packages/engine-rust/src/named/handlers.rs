//! Handlers for the named-operation administrative surface.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use conflux_core::{
    from_value, to_value, Context, EngineError, EngineResult, Operation, ValidationReport, Value,
    ValueKind,
};

use crate::executor::{Executor, OperationHandler};

use super::cache::NamedOperationCache;
use super::detail::{NamedOperationDetail, ParameterDetail};

/// Reads a mandatory string argument.
fn require_string(op: &Operation, key: &str) -> EngineResult<String> {
    op.args()
        .get(key)
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            EngineError::Validation(ValidationReport::message(format!(
                "operation `{}`: `{key}` must be a string",
                op.id()
            )))
        })
}

/// Reads an optional list-of-strings argument.
fn string_list(op: &Operation, key: &str) -> EngineResult<Vec<String>> {
    match op.args().get(key) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(ToString::to_string).ok_or_else(|| {
                    EngineError::Validation(ValidationReport::message(format!(
                        "operation `{}`: `{key}` must hold only strings",
                        op.id()
                    )))
                })
            })
            .collect(),
        Some(_) => Err(EngineError::Validation(ValidationReport::message(format!(
            "operation `{}`: `{key}` must be an array of strings",
            op.id()
        )))),
    }
}

// ---------------------------------------------------------------------------
// AddNamedOperation
// ---------------------------------------------------------------------------

/// Stores a named-operation template.
///
/// Arguments: `operationName`, `operationChain` (a template string or a
/// structured chain), and optionally `description`, `readAccessRoles`,
/// `writeAccessRoles`, `overwriteFlag`, `parameters`, `score`, `inputKind`.
/// The caller becomes the creator.
pub struct AddNamedOperationHandler {
    store: Arc<NamedOperationCache>,
}

impl AddNamedOperationHandler {
    #[must_use]
    pub fn new(store: Arc<NamedOperationCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OperationHandler for AddNamedOperationHandler {
    fn required_args(&self) -> &[&str] {
        &["operationName", "operationChain"]
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let operation_name = require_string(&op, "operationName")?;
        let operations = match op.args().get("operationChain") {
            Some(Value::String(template)) => template.clone(),
            Some(structured) => serde_json::to_string(structured)
                .map_err(|err| EngineError::Internal(err.into()))?,
            None => {
                return Err(EngineError::Validation(ValidationReport::message(
                    "`operationChain` is required",
                )));
            }
        };

        let parameters = match op.args().get("parameters") {
            None => IndexMap::new(),
            Some(value) => from_value::<IndexMap<String, ParameterDetail>>(value).map_err(
                |err| {
                    EngineError::Validation(ValidationReport::message(format!(
                        "`parameters` is malformed: {err}"
                    )))
                },
            )?,
        };
        let input_kind = match op.args().get("inputKind") {
            None => None,
            Some(value) => Some(from_value::<ValueKind>(value).map_err(|err| {
                EngineError::Validation(ValidationReport::message(format!(
                    "`inputKind` is malformed: {err}"
                )))
            })?),
        };

        let detail = NamedOperationDetail {
            operation_name,
            operations,
            description: op
                .args()
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            creator_id: ctx.user().id().to_string(),
            read_access_roles: string_list(&op, "readAccessRoles")?,
            write_access_roles: string_list(&op, "writeAccessRoles")?,
            parameters,
            score: op.args().get("score").and_then(Value::as_i64),
            input_kind,
        };

        let overwrite = op
            .args()
            .get("overwriteFlag")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        self.store
            .add(
                detail,
                overwrite,
                ctx.user(),
                executor.config().admin_auth.as_deref(),
            )
            .await?;
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// DeleteNamedOperation
// ---------------------------------------------------------------------------

/// Removes a named-operation template. Arguments: `operationName`.
pub struct DeleteNamedOperationHandler {
    store: Arc<NamedOperationCache>,
}

impl DeleteNamedOperationHandler {
    #[must_use]
    pub fn new(store: Arc<NamedOperationCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OperationHandler for DeleteNamedOperationHandler {
    fn required_args(&self) -> &[&str] {
        &["operationName"]
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let name = require_string(&op, "operationName")?;
        self.store
            .delete(&name, ctx.user(), executor.config().admin_auth.as_deref())
            .await?;
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// GetAllNamedOperations
// ---------------------------------------------------------------------------

/// Lists every named operation visible to the caller as an array of
/// serialized details.
pub struct GetAllNamedOperationsHandler {
    store: Arc<NamedOperationCache>,
}

impl GetAllNamedOperationsHandler {
    #[must_use]
    pub fn new(store: Arc<NamedOperationCache>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OperationHandler for GetAllNamedOperationsHandler {
    async fn handle(
        &self,
        _op: Operation,
        ctx: &Context,
        executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let details = self
            .store
            .get_all(ctx.user(), executor.config().admin_auth.as_deref())
            .await?;
        let encoded = details
            .iter()
            .map(to_value)
            .collect::<Result<Vec<Value>, _>>()
            .map_err(|err| EngineError::Internal(err.into()))?;
        Ok(Some(Value::Array(encoded)))
    }
}

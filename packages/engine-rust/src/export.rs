//! In-memory export sink and its operation surface.
//!
//! Exporters live on the request [`Context`]; a cloned context starts with
//! none, so side outputs never leak across requests.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use conflux_core::{
    Context, EngineError, EngineResult, Exporter, Operation, ValidationReport, Value,
};

use crate::executor::{Executor, OperationHandler};

/// Operation id for appending the threaded input to a set export.
pub const EXPORT_TO_SET: &str = "ExportToSet";
/// Operation id for reading a set export back.
pub const GET_SET_EXPORT: &str = "GetSetExport";

/// Default exporter id used when an operation names none.
const DEFAULT_EXPORTER_ID: &str = "set";

/// In-memory [`Exporter`] collecting values per key.
pub struct SetExporter {
    id: String,
    entries: DashMap<String, Vec<Value>>,
}

impl SetExporter {
    /// Creates an exporter with the default id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(DEFAULT_EXPORTER_ID)
    }

    /// Creates an exporter with a custom id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entries: DashMap::new(),
        }
    }
}

impl Default for SetExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for SetExporter {
    fn id(&self) -> &str {
        &self.id
    }

    fn add(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.entry(key.to_string()).or_default().push(value);
        Ok(())
    }

    fn get(&self, key: &str) -> anyhow::Result<Vec<Value>> {
        Ok(self
            .entries
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// Resolves the exporter an operation targets.
fn exporter_for(op: &Operation, ctx: &Context) -> EngineResult<Arc<dyn Exporter>> {
    let id = op
        .args()
        .get("exporterId")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_EXPORTER_ID);
    ctx.exporter(id).ok_or_else(|| {
        EngineError::Internal(anyhow::anyhow!(
            "no exporter `{id}` registered on the request context"
        ))
    })
}

/// Appends the operation's input under `key` and passes the input through
/// unchanged, so the chain can keep transforming it.
pub struct ExportToSetHandler;

#[async_trait]
impl OperationHandler for ExportToSetHandler {
    fn required_args(&self) -> &[&str] {
        &["key"]
    }

    fn accepts_input(&self) -> bool {
        true
    }

    async fn handle(
        &self,
        mut op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let Some(key) = op
            .args()
            .get("key")
            .and_then(Value::as_str)
            .map(ToString::to_string)
        else {
            return Err(EngineError::Validation(ValidationReport::message(
                "`key` must be a string",
            )));
        };
        let Some(input) = op.take_input() else {
            return Err(EngineError::Validation(ValidationReport::message(
                "nothing to export: the operation has no input",
            )));
        };

        let exporter = exporter_for(&op, ctx)?;
        exporter
            .add(&key, input.clone())
            .map_err(EngineError::Internal)?;
        Ok(Some(input))
    }
}

/// Returns the values collected under `key` as an array.
pub struct GetSetExportHandler;

#[async_trait]
impl OperationHandler for GetSetExportHandler {
    fn required_args(&self) -> &[&str] {
        &["key"]
    }

    async fn handle(
        &self,
        op: Operation,
        ctx: &Context,
        _executor: &Executor,
    ) -> EngineResult<Option<Value>> {
        let Some(key) = op.args().get("key").and_then(Value::as_str) else {
            return Err(EngineError::Validation(ValidationReport::message(
                "`key` must be a string",
            )));
        };
        let exporter = exporter_for(&op, ctx)?;
        let values = exporter.get(key).map_err(EngineError::Internal)?;
        Ok(Some(Value::Array(values)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use conflux_core::{OperationChain, User};

    use crate::config::EngineConfig;
    use crate::executor::FnHandler;

    use super::*;

    #[tokio::test]
    async fn export_collects_and_reads_back_within_one_request() {
        let executor = Executor::new(EngineConfig::with_id("test"));
        executor.add_handler(
            "Echo",
            Some(Arc::new(
                FnHandler::new(|op: Operation, _ctx: &Context| -> EngineResult<Option<Value>> {
                    Ok(op.args().get("msg").cloned())
                })
                .with_required_args(&["msg"]),
            )),
        );
        executor.add_handler(EXPORT_TO_SET, Some(Arc::new(ExportToSetHandler)));
        executor.add_handler(GET_SET_EXPORT, Some(Arc::new(GetSetExportHandler)));

        let mut ctx = Context::new(User::new("alice"));
        ctx.add_exporter(Arc::new(SetExporter::new()));

        let chain = OperationChain::new(vec![
            Operation::new("Echo").arg("msg", "one").into(),
            Operation::new(EXPORT_TO_SET).arg("key", "results").into(),
            Operation::new("Echo").arg("msg", "two").into(),
            Operation::new(EXPORT_TO_SET).arg("key", "results").into(),
            Operation::new(GET_SET_EXPORT).arg("key", "results").into(),
        ]);
        let outcome = executor.execute(chain, ctx).await.unwrap();
        assert_eq!(
            outcome.result,
            Some(Value::Array(vec![Value::from("one"), Value::from("two")]))
        );
    }

    #[tokio::test]
    async fn export_without_input_is_rejected() {
        let executor = Executor::new(EngineConfig::with_id("test"));
        executor.add_handler(EXPORT_TO_SET, Some(Arc::new(ExportToSetHandler)));

        let mut ctx = Context::new(User::new("alice"));
        ctx.add_exporter(Arc::new(SetExporter::new()));

        let err = executor
            .execute(Operation::new(EXPORT_TO_SET).arg("key", "k"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_exporter_is_an_operation_failure() {
        let executor = Executor::new(EngineConfig::with_id("test"));
        executor.add_handler(GET_SET_EXPORT, Some(Arc::new(GetSetExportHandler)));

        let err = executor
            .execute(
                Operation::new(GET_SET_EXPORT).arg("key", "k"),
                Context::new(User::new("alice")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Operation { .. }));
    }
}

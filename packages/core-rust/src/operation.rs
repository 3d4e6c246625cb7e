//! Operation and operation-chain data model.
//!
//! An [`Operation`] is a string-identified command with a case-insensitive
//! argument map, a side-channel options map, and an optional explicit input.
//! An [`OperationChain`] is an ordered sequence of operations (possibly
//! nested chains) dispatched in sequence order and treated as a single
//! composite operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::args::OpArgs;
use crate::value::Value;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A polymorphic, string-identified command.
///
/// The `id` is the dispatch key, matched case-insensitively by the handler
/// registry. `options` carry side-channel metadata (for example an admin
/// auth) that the engine core never interprets; they are excluded from
/// equality. `input` is the explicit input slot; when absent, the executor
/// may thread the previous operation's result into it.
///
/// Wire shape: `{"id": ..., "input"?: ..., "options"?: {...}}` with every
/// remaining key treated as an argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    options: BTreeMap<String, String>,
    #[serde(flatten)]
    args: OpArgs,
}

impl Operation {
    /// Creates an operation with the given id and no arguments.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input: None,
            options: BTreeMap::new(),
            args: OpArgs::new(),
        }
    }

    /// Adds an argument (builder style).
    #[must_use]
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key, value);
        self
    }

    /// Adds a side-channel option (builder style).
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Sets the explicit input (builder style).
    #[must_use]
    pub fn with_input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// The operation id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The argument map.
    #[must_use]
    pub fn args(&self) -> &OpArgs {
        &self.args
    }

    /// Mutable access to the argument map.
    pub fn args_mut(&mut self) -> &mut OpArgs {
        &mut self.args
    }

    /// The side-channel options map.
    #[must_use]
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// The explicit input, if one was supplied.
    #[must_use]
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    /// Replaces the explicit input.
    pub fn set_input(&mut self, input: Option<Value>) {
        self.input = input;
    }

    /// Removes and returns the explicit input.
    pub fn take_input(&mut self) -> Option<Value> {
        self.input.take()
    }
}

impl PartialEq for Operation {
    /// Options are a side channel and do not participate in equality.
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.args == other.args && self.input == other.input
    }
}

// ---------------------------------------------------------------------------
// OperationChain
// ---------------------------------------------------------------------------

/// Default id for chains constructed without an explicit one.
const DEFAULT_CHAIN_ID: &str = "OperationChain";

/// An ordered sequence of operations treated as a single composite
/// operation.
///
/// Dispatch order is sequence order; nested chains flatten as encountered.
/// The chain id is always suffixed with `"Chain"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationChain {
    id: String,
    operations: Vec<OpElement>,
}

impl OperationChain {
    /// Creates a chain with the default id.
    #[must_use]
    pub fn new(operations: Vec<OpElement>) -> Self {
        Self::with_id(DEFAULT_CHAIN_ID, operations)
    }

    /// Creates a chain with the given id, suffixing `"Chain"` if missing.
    #[must_use]
    pub fn with_id(id: impl Into<String>, operations: Vec<OpElement>) -> Self {
        let mut id = id.into();
        if !id.ends_with("Chain") {
            id.push_str("Chain");
        }
        Self { id, operations }
    }

    /// Parses a chain from its JSON encoding: either a bare array of
    /// elements or an object carrying an `operations` key.
    ///
    /// # Errors
    ///
    /// Returns an error if `template` is not valid JSON for either shape.
    pub fn parse(template: &str) -> Result<Self, serde_json::Error> {
        if template.trim_start().starts_with('[') {
            serde_json::from_str::<Vec<OpElement>>(template).map(Self::new)
        } else {
            serde_json::from_str::<OpElement>(template).map(OpElement::into_chain)
        }
    }

    /// Builds a chain from a structured [`Value`]: an array of elements, a
    /// chain object, or a single operation object.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not describe operations.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Array(_) => crate::value::from_value::<Vec<OpElement>>(value).map(Self::new),
            _ => crate::value::from_value::<OpElement>(value).map(OpElement::into_chain),
        }
    }

    /// The chain id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The elements in dispatch order.
    #[must_use]
    pub fn operations(&self) -> &[OpElement] {
        &self.operations
    }

    /// Mutable access to the element list, for chain-rewriting hooks.
    pub fn operations_mut(&mut self) -> &mut Vec<OpElement> {
        &mut self.operations
    }

    /// Consumes the chain, returning its elements.
    #[must_use]
    pub fn into_operations(self) -> Vec<OpElement> {
        self.operations
    }

    /// Appends an element.
    pub fn push(&mut self, element: impl Into<OpElement>) {
        self.operations.push(element.into());
    }

    /// Number of top-level elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the chain has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every operation in dispatch order, flattening nested chains.
    #[must_use]
    pub fn flatten(&self) -> Vec<&Operation> {
        let mut out = Vec::new();
        collect_operations(&self.operations, &mut out);
        out
    }

    /// Mutable reference to the first operation in dispatch order,
    /// descending into nested chains.
    pub fn first_operation_mut(&mut self) -> Option<&mut Operation> {
        first_operation_mut(&mut self.operations)
    }
}

fn collect_operations<'a>(elements: &'a [OpElement], out: &mut Vec<&'a Operation>) {
    for element in elements {
        match element {
            OpElement::Chain(chain) => collect_operations(&chain.operations, out),
            OpElement::Op(op) => out.push(op),
        }
    }
}

/// Mutable reference to the first operation among `elements` in dispatch
/// order, descending into nested chains.
pub fn first_operation_mut(elements: &mut [OpElement]) -> Option<&mut Operation> {
    for element in elements {
        match element {
            OpElement::Chain(chain) => {
                if let Some(op) = first_operation_mut(&mut chain.operations) {
                    return Some(op);
                }
            }
            OpElement::Op(op) => return Some(op),
        }
    }
    None
}

impl From<Operation> for OperationChain {
    fn from(op: Operation) -> Self {
        Self::with_id(format!("{}Chain", op.id()), vec![OpElement::Op(op)])
    }
}

impl<'de> Deserialize<'de> for OperationChain {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct ChainRepr {
            #[serde(default)]
            id: Option<String>,
            operations: Vec<OpElement>,
        }

        let repr = ChainRepr::deserialize(deserializer)?;
        Ok(Self::with_id(
            repr.id.unwrap_or_else(|| DEFAULT_CHAIN_ID.to_string()),
            repr.operations,
        ))
    }
}

// ---------------------------------------------------------------------------
// OpElement
// ---------------------------------------------------------------------------

/// One element of a chain: a single operation or a nested chain.
///
/// Untagged: an object carrying an `operations` key deserializes as a
/// nested chain, anything else as an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpElement {
    Chain(OperationChain),
    Op(Operation),
}

impl OpElement {
    /// Converts this element into a chain, wrapping a bare operation.
    #[must_use]
    pub fn into_chain(self) -> OperationChain {
        match self {
            OpElement::Chain(chain) => chain,
            OpElement::Op(op) => op.into(),
        }
    }

    /// The operation id, or the chain id for nested chains.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            OpElement::Chain(chain) => chain.id(),
            OpElement::Op(op) => op.id(),
        }
    }
}

impl From<Operation> for OpElement {
    fn from(op: Operation) -> Self {
        OpElement::Op(op)
    }
}

impl From<OperationChain> for OpElement {
    fn from(chain: OperationChain) -> Self {
        OpElement::Chain(chain)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

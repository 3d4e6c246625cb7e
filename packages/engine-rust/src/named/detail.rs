//! Stored named-operation templates and their parameter machinery.
//!
//! A template is a serialized operation chain containing `${param}`
//! placeholders. Expansion substitutes each placeholder with the effective
//! parameter value and reparses the result; the substitute-then-reparse
//! round trip is what coerces parameter values into typed arguments.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use conflux_core::{
    EngineError, EngineResult, OpElement, OperationChain, User, ValidationReport, Value, ValueKind,
};

use super::NAMED_OPERATION;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Declaration of one named parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterDetail {
    /// Value used when the caller supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Declared runtime type of the parameter.
    pub value_kind: ValueKind,
    /// Whether a value (or default) must exist at resolution time.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// A stored, parameterized chain template referenced by name.
///
/// Persisted through the [`Cache`](conflux_core::Cache) capability; access
/// is gated by creator id, the admin auth, and read/write roles matched
/// against the caller's op auths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedOperationDetail {
    /// Unique name within the backing cache.
    pub operation_name: String,
    /// Serialized operation-chain template, possibly holding `${param}`
    /// placeholders.
    pub operations: String,
    #[serde(default)]
    pub description: String,
    /// Id of the user that stored the detail.
    pub creator_id: String,
    /// Auth strings granting read access.
    #[serde(default)]
    pub read_access_roles: Vec<String>,
    /// Auth strings granting write access.
    #[serde(default)]
    pub write_access_roles: Vec<String>,
    /// Declared parameters, in declaration order.
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterDetail>,
    /// Fixed score of the whole named operation, if configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// Declared input type of the expanded chain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_kind: Option<ValueKind>,
}

/// Whether `user` holds the configured admin auth.
pub(crate) fn is_admin(user: &User, admin_auth: Option<&str>) -> bool {
    admin_auth.is_some_and(|auth| user.has_auth(auth))
}

impl NamedOperationDetail {
    /// Whether `user` may fetch and resolve this detail.
    #[must_use]
    pub fn has_read_access(&self, user: &User, admin_auth: Option<&str>) -> bool {
        self.creator_id == user.id()
            || is_admin(user, admin_auth)
            || self
                .read_access_roles
                .iter()
                .chain(&self.write_access_roles)
                .any(|role| user.has_auth(role))
    }

    /// Whether `user` may overwrite or delete this detail.
    #[must_use]
    pub fn has_write_access(&self, user: &User, admin_auth: Option<&str>) -> bool {
        self.creator_id == user.id()
            || is_admin(user, admin_auth)
            || self.write_access_roles.iter().any(|role| user.has_auth(role))
    }

    /// Store-time validation.
    ///
    /// Every declared parameter's `${name}` must appear verbatim in the
    /// template; every placeholder must have a declaration; the template
    /// (with defaults, or type-appropriate dummies, substituted) must parse
    /// into a chain; and the chain must not reference another named
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] describing every failure.
    pub fn validate(&self) -> EngineResult<()> {
        let mut report = ValidationReport::new();

        for name in self.parameters.keys() {
            if !self.operations.contains(&format!("${{{name}}}")) {
                report.push(format!(
                    "declared parameter `{name}` has no `${{{name}}}` placeholder in the template"
                ));
            }
        }

        let referenced: BTreeSet<&str> = PLACEHOLDER
            .captures_iter(&self.operations)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        for name in referenced {
            if !self.parameters.contains_key(name) {
                report.push(format!(
                    "placeholder `${{{name}}}` has no declared parameter"
                ));
            }
        }

        if report.is_empty() {
            let probe = self.substitute(&self.defaults_with_dummies())?;
            match parse_substituted(&self.operation_name, &probe) {
                Ok(elements) => {
                    if contains_named_reference(&elements) {
                        report.push(format!(
                            "named operation `{}` must not reference another named operation",
                            self.operation_name
                        ));
                    }
                }
                Err(EngineError::Validation(inner)) => {
                    for error in inner.errors() {
                        report.push(error.clone());
                    }
                }
                Err(other) => return Err(other),
            }
        }

        if report.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(report))
        }
    }

    /// Expands the template against caller-supplied parameter values.
    ///
    /// Supplied values are checked against the declarations (unknown names
    /// and type mismatches are rejected); required parameters must resolve
    /// to a value or a default; optional parameters with neither substitute
    /// as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] on parameter errors, aggregated.
    pub fn expand(&self, supplied: &BTreeMap<String, Value>) -> EngineResult<Vec<OpElement>> {
        let mut report = ValidationReport::new();

        for (name, value) in supplied {
            match self.parameters.get(name) {
                None => report.push(format!(
                    "unknown parameter `{name}` for named operation `{}`",
                    self.operation_name
                )),
                Some(decl) if !decl.value_kind.accepts(value) => report.push(format!(
                    "parameter `{name}` expects a {:?} value",
                    decl.value_kind
                )),
                Some(_) => {}
            }
        }

        let mut effective = BTreeMap::new();
        for (name, decl) in &self.parameters {
            if let Some(value) = supplied.get(name) {
                effective.insert(name.clone(), value.clone());
            } else if let Some(default) = &decl.default_value {
                effective.insert(name.clone(), default.clone());
            } else if decl.required {
                report.push(format!(
                    "required parameter `{name}` has no supplied value and no default"
                ));
            } else {
                effective.insert(name.clone(), Value::Null);
            }
        }

        if !report.is_empty() {
            return Err(EngineError::Validation(report));
        }

        let substituted = self.substitute(&effective)?;
        parse_substituted(&self.operation_name, &substituted)
    }

    /// Substitutes every `${name}` token with its encoded value.
    fn substitute(&self, effective: &BTreeMap<String, Value>) -> EngineResult<String> {
        let mut template = self.operations.clone();
        for (name, value) in effective {
            let token = format!("${{{name}}}");
            let encoded = encode_parameter(value)?;
            template = template.replace(&token, &encoded);
        }
        Ok(template)
    }

    /// Default (or type-appropriate dummy) value per declared parameter,
    /// used to probe the template shape at store time.
    fn defaults_with_dummies(&self) -> BTreeMap<String, Value> {
        self.parameters
            .iter()
            .map(|(name, decl)| {
                let value = decl
                    .default_value
                    .clone()
                    .unwrap_or_else(|| dummy_value(decl.value_kind));
                (name.clone(), value)
            })
            .collect()
    }
}

/// Encodes a parameter value for splicing into the template.
///
/// String values splice their JSON-escaped content without the surrounding
/// quotes (the quotes belong to the template, which lets several
/// placeholders share one string literal). Every other value splices its
/// JSON encoding verbatim.
fn encode_parameter(value: &Value) -> EngineResult<String> {
    let encoded = serde_json::to_string(value).map_err(|err| EngineError::Internal(err.into()))?;
    Ok(match value {
        Value::String(_) => encoded[1..encoded.len() - 1].to_string(),
        _ => encoded,
    })
}

/// Parses a substituted template into chain elements.
fn parse_substituted(name: &str, template: &str) -> EngineResult<Vec<OpElement>> {
    OperationChain::parse(template)
        .map(OperationChain::into_operations)
        .map_err(|err| {
            EngineError::Validation(ValidationReport::message(format!(
                "named operation `{name}`: template is not a valid chain: {err}"
            )))
        })
}

/// Whether any element (recursively) is a named-operation reference.
pub(crate) fn contains_named_reference(elements: &[OpElement]) -> bool {
    elements.iter().any(|element| match element {
        OpElement::Chain(chain) => contains_named_reference(chain.operations()),
        OpElement::Op(op) => op.id().eq_ignore_ascii_case(NAMED_OPERATION),
    })
}

/// Placeholder stand-in for a parameter kind, used only for store-time
/// template probing.
fn dummy_value(kind: ValueKind) -> Value {
    match kind {
        ValueKind::Any => Value::Null,
        ValueKind::Bool => Value::Bool(false),
        ValueKind::Int => Value::Int(0),
        ValueKind::Float => Value::Float(0.0),
        ValueKind::String => Value::String(String::new()),
        ValueKind::Array => Value::Array(Vec::new()),
        ValueKind::Map => Value::Map(BTreeMap::new()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use conflux_core::Operation;

    use super::*;

    fn string_param(default: Option<&str>, required: bool) -> ParameterDetail {
        ParameterDetail {
            default_value: default.map(Value::from),
            value_kind: ValueKind::String,
            required,
            description: String::new(),
        }
    }

    fn detail(template: &str, parameters: Vec<(&str, ParameterDetail)>) -> NamedOperationDetail {
        NamedOperationDetail {
            operation_name: "sample".to_string(),
            operations: template.to_string(),
            description: String::new(),
            creator_id: "creator".to_string(),
            read_access_roles: Vec::new(),
            write_access_roles: Vec::new(),
            parameters: parameters
                .into_iter()
                .map(|(name, decl)| (name.to_string(), decl))
                .collect(),
            score: None,
            input_kind: None,
        }
    }

    #[test]
    fn default_substitution_duplicates_within_one_string() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}${v}"}]"#,
            vec![("v", string_param(Some("a"), true))],
        );
        let expanded = d.expand(&BTreeMap::new()).unwrap();
        assert_eq!(expanded.len(), 1);
        let expected = Operation::new("Echo").arg("msg", "aa");
        assert_eq!(expanded[0], OpElement::Op(expected));
    }

    #[test]
    fn supplied_value_overrides_default() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}"}]"#,
            vec![("v", string_param(Some("a"), true))],
        );
        let supplied = BTreeMap::from([("v".to_string(), Value::from("override"))]);
        let expanded = d.expand(&supplied).unwrap();
        let expected = Operation::new("Echo").arg("msg", "override");
        assert_eq!(expanded[0], OpElement::Op(expected));
    }

    #[test]
    fn non_string_values_substitute_as_typed_json() {
        let d = detail(
            r#"[{"id":"Limit","count":${n}}]"#,
            vec![(
                "n",
                ParameterDetail {
                    default_value: Some(Value::Int(5)),
                    value_kind: ValueKind::Int,
                    required: true,
                    description: String::new(),
                },
            )],
        );
        let expanded = d.expand(&BTreeMap::new()).unwrap();
        let OpElement::Op(op) = &expanded[0] else {
            panic!("expected a single operation");
        };
        assert_eq!(op.args().get("count"), Some(&Value::Int(5)));
    }

    #[test]
    fn rejects_declared_parameter_without_placeholder() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${param1}"}]"#,
            vec![
                ("param1", string_param(Some("a"), false)),
                ("param2", string_param(Some("b"), false)),
            ],
        );
        let err = d.validate().unwrap_err();
        match err {
            EngineError::Validation(report) => {
                assert!(report.to_string().contains("param2"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_placeholder_without_declaration() {
        let d = detail(r#"[{"id":"Echo","msg":"${ghost}"}]"#, vec![]);
        let err = d.validate().unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn rejects_nested_named_operation_reference() {
        let d = detail(
            r#"[{"id":"NamedOperation","name":"other"}]"#,
            vec![],
        );
        let err = d.validate().unwrap_err();
        match err {
            EngineError::Validation(report) => {
                assert!(report.to_string().contains("must not reference"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_supplied_parameter() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}"}]"#,
            vec![("v", string_param(Some("a"), true))],
        );
        let supplied = BTreeMap::from([("other".to_string(), Value::from("x"))]);
        let err = d.expand(&supplied).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn rejects_type_mismatch() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}"}]"#,
            vec![("v", string_param(None, true))],
        );
        let supplied = BTreeMap::from([("v".to_string(), Value::Int(7))]);
        let err = d.expand(&supplied).unwrap_err();
        match err {
            EngineError::Validation(report) => {
                assert!(report.to_string().contains("expects a String value"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn rejects_required_parameter_without_value_or_default() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}"}]"#,
            vec![("v", string_param(None, true))],
        );
        let err = d.expand(&BTreeMap::new()).unwrap_err();
        match err {
            EngineError::Validation(report) => {
                assert!(report.to_string().contains("required parameter `v`"));
            }
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn access_checks_cover_creator_roles_and_admin() {
        let mut d = detail("[]", vec![]);
        d.read_access_roles = vec!["readers".to_string()];
        d.write_access_roles = vec!["writers".to_string()];

        let creator = User::new("creator");
        assert!(d.has_read_access(&creator, None));
        assert!(d.has_write_access(&creator, None));

        let reader = User::with_auths("bob", ["readers"]);
        assert!(d.has_read_access(&reader, None));
        assert!(!d.has_write_access(&reader, None));

        let writer = User::with_auths("carol", ["writers"]);
        assert!(d.has_read_access(&writer, None));
        assert!(d.has_write_access(&writer, None));

        let stranger = User::new("mallory");
        assert!(!d.has_read_access(&stranger, None));

        let admin = User::with_auths("root", ["superuser"]);
        assert!(d.has_read_access(&admin, Some("superuser")));
        assert!(d.has_write_access(&admin, Some("superuser")));
        assert!(!d.has_read_access(&admin, None));
    }

    #[test]
    fn serde_round_trip_uses_camel_case() {
        let d = detail(
            r#"[{"id":"Echo","msg":"${v}"}]"#,
            vec![("v", string_param(Some("a"), true))],
        );
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("operationName"));
        assert!(json.contains("defaultValue"));
        let back: NamedOperationDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}

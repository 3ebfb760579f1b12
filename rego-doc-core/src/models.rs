//! Core domain models

use crate::CoreError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Comparison applied by a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    AnyIn,
    AllIn,
    NoneIn,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Regex,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Exists,
    NotExists,
}

impl Operator {
    pub const ALL: [Operator; 18] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::In,
        Operator::NotIn,
        Operator::AnyIn,
        Operator::AllIn,
        Operator::NoneIn,
        Operator::Contains,
        Operator::NotContains,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::Regex,
        Operator::GreaterThan,
        Operator::LessThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThanOrEqual,
        Operator::Exists,
        Operator::NotExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::AnyIn => "any_in",
            Operator::AllIn => "all_in",
            Operator::NoneIn => "none_in",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::Regex => "regex",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterThanOrEqual => "greater_than_or_equal",
            Operator::LessThanOrEqual => "less_than_or_equal",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
        }
    }

    /// Membership operators always compare against a set
    pub fn is_membership(&self) -> bool {
        matches!(
            self,
            Operator::In | Operator::NotIn | Operator::AnyIn | Operator::AllIn | Operator::NoneIn
        )
    }

    /// Existence tests take no comparand
    pub fn is_existence(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| CoreError::UnknownOperator(s.to_string()))
    }
}

/// Decision an effect carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Block,
    Mask,
    Decrypt,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Block => "block",
            Action::Mask => "mask",
            Action::Decrypt => "decrypt",
        }
    }

    /// Column-level actions need to know which columns they apply to
    pub fn requires_target(&self) -> bool {
        matches!(self, Action::Mask | Action::Decrypt)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "allow" => Ok(Action::Allow),
            "block" => Ok(Action::Block),
            "mask" => Ok(Action::Mask),
            "decrypt" => Ok(Action::Decrypt),
            other => Err(CoreError::UnknownAction(other.to_string())),
        }
    }
}

/// A named literal, written as JSON text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    /// Rego-compatible JSON, emitted verbatim
    #[serde(deserialize_with = "json_text")]
    pub value: String,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A single test against the policy input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(alias = "test")]
    pub operator: Operator,
    /// Dotted path below `input`, e.g. `user.groups`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    /// Inline literals; anything that is not valid JSON renders as a string
    #[serde(
        default,
        deserialize_with = "literal_strings",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub values: Vec<String>,
    /// Name of a constant to compare against instead of `values`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
}

impl Condition {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            variable: None,
            values: Vec::new(),
            constant: None,
        }
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constant(mut self, constant: impl Into<String>) -> Self {
        self.constant = Some(constant.into());
        self
    }

    /// The variable path, treating an empty string as unset
    pub fn variable_path(&self) -> Option<&str> {
        non_empty(&self.variable)
    }

    /// The constant reference, treating an empty string as unset
    pub fn constant_ref(&self) -> Option<&str> {
        non_empty(&self.constant)
    }
}

/// A named block of conditions that must all hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub name: String,
    #[serde(default, alias = "condition")]
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

/// Reference from a rule to a predicate; `!name` negates it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PredicateRef {
    pub name: String,
    pub negated: bool,
}

impl PredicateRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: false,
        }
    }

    pub fn not(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            negated: true,
        }
    }
}

impl From<&str> for PredicateRef {
    fn from(value: &str) -> Self {
        match value.strip_prefix('!') {
            Some(name) => Self::not(name),
            None => Self::new(value),
        }
    }
}

impl From<String> for PredicateRef {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<PredicateRef> for String {
    fn from(value: PredicateRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for PredicateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "!{}", self.name)
        } else {
            f.write_str(&self.name)
        }
    }
}

/// Columns a mask or decrypt effect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target<'a> {
    AllColumns,
    DataLabel(&'a str),
    ColumnName(&'a str),
}

/// The decision object a rule evaluates to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub action: Action,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub effect_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typesafe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub all_columns: bool,
}

impl Effect {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            effect_type: None,
            sub_type: None,
            typesafe: None,
            message: None,
            reason: None,
            data_label: None,
            column_name: None,
            all_columns: false,
        }
    }

    pub fn allow() -> Self {
        Self::new(Action::Allow)
    }

    pub fn block() -> Self {
        Self::new(Action::Block)
    }

    pub fn mask() -> Self {
        Self::new(Action::Mask)
    }

    pub fn decrypt() -> Self {
        Self::new(Action::Decrypt)
    }

    pub fn with_type(mut self, effect_type: impl Into<String>) -> Self {
        self.effect_type = Some(effect_type.into());
        self
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    pub fn with_typesafe(mut self, typesafe: impl Into<String>) -> Self {
        self.typesafe = Some(typesafe.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_data_label(mut self, data_label: impl Into<String>) -> Self {
        self.data_label = Some(data_label.into());
        self
    }

    pub fn with_column_name(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = Some(column_name.into());
        self
    }

    pub fn with_all_columns(mut self) -> Self {
        self.all_columns = true;
        self
    }

    /// Every target selector that is set, in precedence order
    pub fn targets(&self) -> Vec<Target<'_>> {
        let mut targets = Vec::new();
        if self.all_columns {
            targets.push(Target::AllColumns);
        }
        if let Some(label) = non_empty(&self.data_label) {
            targets.push(Target::DataLabel(label));
        }
        if let Some(column) = non_empty(&self.column_name) {
            targets.push(Target::ColumnName(column));
        }
        targets
    }

    /// The effective target selector
    pub fn target(&self) -> Option<Target<'_>> {
        self.targets().into_iter().next()
    }
}

/// A named decision guarded by predicate references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    /// Default rules supply the fallback value for `name`
    #[serde(default, rename = "default")]
    pub is_default: bool,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when_all_of: Vec<PredicateRef>,
    /// Position in the declaring document
    #[serde(skip)]
    pub index: usize,
}

impl Rule {
    pub fn new(name: impl Into<String>, effect: Effect) -> Self {
        Self {
            name: name.into(),
            is_default: false,
            effect,
            when_all_of: Vec::new(),
            index: 0,
        }
    }

    pub fn default_for(name: impl Into<String>, effect: Effect) -> Self {
        Self {
            is_default: true,
            ..Self::new(name, effect)
        }
    }

    pub fn when(mut self, reference: impl Into<PredicateRef>) -> Self {
        self.when_all_of.push(reference.into());
        self
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = index;
        self
    }
}

/// A complete declarative policy, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included_connectors: Vec<String>,
    #[serde(default, alias = "constant")]
    pub constants: Vec<Constant>,
    #[serde(default, alias = "predicate")]
    pub predicates: Vec<Predicate>,
    #[serde(default, alias = "rule")]
    pub rules: Vec<Rule>,
    /// Hand-written Rego appended verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_rego: Option<String>,
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, CoreError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Load a document from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn to_json_pretty(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Strings already hold JSON text; any other JSON value is stored as its
/// compact serialization.
fn json_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Accept strings as-is and keep other JSON scalars as their literal text.
fn literal_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .map(|value| match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_round_trips_through_str() {
        for op in Operator::ALL {
            assert_eq!(op.as_str().parse::<Operator>().unwrap(), op);
        }
        assert!("between".parse::<Operator>().is_err());
    }

    #[test]
    fn test_membership_family() {
        let members: Vec<_> = Operator::ALL.iter().filter(|op| op.is_membership()).collect();
        assert_eq!(
            members,
            vec![
                &Operator::In,
                &Operator::NotIn,
                &Operator::AnyIn,
                &Operator::AllIn,
                &Operator::NoneIn
            ]
        );
    }

    #[test]
    fn test_predicate_ref_strips_negation() {
        let negated = PredicateRef::from("!is_admin");
        assert!(negated.negated);
        assert_eq!(negated.name, "is_admin");
        assert_eq!(negated.to_string(), "!is_admin");

        let plain = PredicateRef::from("is_admin");
        assert!(!plain.negated);
        assert_eq!(plain.name, "is_admin");
    }

    #[test]
    fn test_effect_target_precedence() {
        let effect = Effect::mask().with_column_name("ssn").with_all_columns();
        assert_eq!(effect.targets().len(), 2);
        assert_eq!(effect.target(), Some(Target::AllColumns));

        let effect = Effect::decrypt().with_data_label("");
        assert!(effect.targets().is_empty());
    }

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "description": "Production access",
            "included_connectors": ["db-proxy"],
            "constant": [{ "name": "allowed_groups", "value": "[\"admin\"]" }],
            "predicate": [{
                "name": "is_adult",
                "condition": [{ "test": "greater_than", "variable": "user.age", "values": [18] }]
            }],
            "rules": [{
                "name": "session",
                "effect": { "action": "mask", "type": "redact.full", "data_label": "email_address" },
                "when_all_of": ["is_adult", "!is_banned"]
            }, {
                "name": "session",
                "default": true,
                "effect": { "action": "block" }
            }]
        }"#;

        let doc = PolicyDocument::from_json(json).unwrap();
        assert_eq!(doc.description.as_deref(), Some("Production access"));
        assert_eq!(doc.constants, vec![Constant::new("allowed_groups", r#"["admin"]"#)]);

        let condition = &doc.predicates[0].conditions[0];
        assert_eq!(condition.operator, Operator::GreaterThan);
        assert_eq!(condition.variable_path(), Some("user.age"));
        assert_eq!(condition.values, vec!["18".to_string()]);

        let rule = &doc.rules[0];
        assert_eq!(rule.effect.effect_type.as_deref(), Some("redact.full"));
        assert_eq!(rule.effect.target(), Some(Target::DataLabel("email_address")));
        assert_eq!(
            rule.when_all_of,
            vec![PredicateRef::new("is_adult"), PredicateRef::not("is_banned")]
        );
        assert!(doc.rules[1].is_default);
    }

    #[test]
    fn test_constant_value_accepts_structured_json() {
        let json = r#"{ "constants": [
            { "name": "allowed_groups", "value": ["admin", "user"] },
            { "name": "limits", "value": "{\"admin\": -1}" }
        ] }"#;

        let doc = PolicyDocument::from_json(json).unwrap();
        assert_eq!(doc.constants[0].value, r#"["admin","user"]"#);
        assert_eq!(doc.constants[1].value, r#"{"admin": -1}"#);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let json = r#"{ "predicates": [{ "name": "p", "conditions": [{ "operator": "between" }] }] }"#;
        let err = PolicyDocument::from_json(json).unwrap_err();
        assert!(matches!(err, CoreError::Serialization(_)));
    }

    #[test]
    fn test_document_serializes_refs_as_strings() {
        let mut doc = PolicyDocument::new();
        doc.rules.push(Rule::new("session", Effect::allow()).when("!is_banned"));

        let json = doc.to_json_pretty().unwrap();
        assert!(json.contains(r#""!is_banned""#));
        assert_eq!(PolicyDocument::from_json(&json).unwrap(), doc);
    }
}

//! Structural and referential checks over policy documents
//!
//! Every check returns the diagnostics it found instead of failing fast, so a
//! caller sees all problems with a document in one pass.

use crate::error::{Diagnostic, Location, ReferenceKind};
use crate::generator::Generator;
use regex::Regex;
use rego_doc_core::{Condition, Constant, Predicate, Rule, Target};
use serde::de::IgnoredAny;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("identifier pattern is valid")
});

static VARIABLE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*(\.[a-zA-Z_][a-zA-Z0-9_]*)*$")
        .expect("variable path pattern is valid")
});

/// Rego keywords and built-ins that cannot be redefined at package level
const RESERVED_NAMES: &[&str] = &[
    "input", "data", "true", "false", "null", "if", "in", "some", "every", "not", "with", "as",
    "default", "else", "package", "import", "count", "sum", "max", "min", "contains",
    "startswith", "endswith",
];

/// Why a name cannot be used as a Rego identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameError {
    Invalid,
    Reserved,
}

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

pub fn validate_identifier(name: &str) -> Result<(), NameError> {
    if !IDENTIFIER.is_match(name) {
        return Err(NameError::Invalid);
    }
    if is_reserved(name) {
        return Err(NameError::Reserved);
    }
    Ok(())
}

fn check_name(location: &Location, name: &str) -> Option<Diagnostic> {
    let location = location.clone();
    let name = name.to_string();
    match validate_identifier(&name) {
        Ok(()) => None,
        Err(NameError::Invalid) => Some(Diagnostic::NameInvalid { location, name }),
        Err(NameError::Reserved) => Some(Diagnostic::NameReserved { location, name }),
    }
}

/// Whether `path` is a dotted chain of identifiers below `input`
pub fn is_variable_path(path: &str) -> bool {
    VARIABLE_PATH.is_match(path)
}

/// Whether `value` parses as a JSON document
pub fn is_json_literal(value: &str) -> bool {
    serde_json::from_str::<IgnoredAny>(value).is_ok()
}

pub fn validate_constant(index: usize, constant: &Constant) -> Vec<Diagnostic> {
    let location = Location::Constant {
        index,
        name: constant.name.clone(),
    };
    let mut diagnostics: Vec<_> = check_name(&location, &constant.name).into_iter().collect();

    if !is_json_literal(&constant.value) {
        diagnostics.push(Diagnostic::InvalidLiteral { location });
    }

    diagnostics
}

pub fn validate_predicate(
    index: usize,
    predicate: &Predicate,
    constants: &BTreeMap<String, String>,
) -> Vec<Diagnostic> {
    let location = Location::Predicate {
        index,
        name: predicate.name.clone(),
    };
    let mut diagnostics: Vec<_> = check_name(&location, &predicate.name).into_iter().collect();

    if constants.contains_key(&predicate.name) {
        diagnostics.push(Diagnostic::NameConflict {
            location: location.clone(),
            existing: "a constant".to_string(),
        });
    }

    if predicate.conditions.is_empty() {
        diagnostics.push(Diagnostic::MissingField {
            location,
            field: "condition",
            hint: "a predicate requires at least one condition block".to_string(),
        });
    }

    diagnostics
}

pub fn validate_condition(condition: &Condition, location: &Location) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let needs_value = !condition.operator.is_existence();

    if needs_value && condition.variable_path().is_none() {
        diagnostics.push(Diagnostic::MissingField {
            location: location.clone(),
            field: "variable",
            hint: r#"specify the input path to check (e.g., "user.groups", "resource.name")"#
                .to_string(),
        });
    }

    if let Some(path) = condition.variable_path().filter(|p| !is_variable_path(p)) {
        diagnostics.push(Diagnostic::InvalidPath {
            location: location.clone(),
            path: path.to_string(),
        });
    }

    if needs_value && condition.values.is_empty() && condition.constant_ref().is_none() {
        diagnostics.push(Diagnostic::MissingField {
            location: location.clone(),
            field: "values",
            hint: format!(
                "{:?} test requires 'values' or 'constant' to compare against",
                condition.operator.as_str()
            ),
        });
    }

    if !condition.values.is_empty() && condition.constant_ref().is_some() {
        diagnostics.push(Diagnostic::ConflictingValueSource {
            location: location.clone(),
        });
    }

    diagnostics
}

pub fn validate_rule(rule: &Rule) -> Vec<Diagnostic> {
    let location = Location::Rule {
        index: rule.index,
        name: rule.name.clone(),
    };
    let mut diagnostics: Vec<_> = check_name(&location, &rule.name).into_iter().collect();

    if rule.is_default && !rule.when_all_of.is_empty() {
        diagnostics.push(Diagnostic::DefaultRuleWithCondition {
            location: location.clone(),
        });
    }

    let action = rule.effect.action;
    // A default rule has no body to bind the filtered `columns` in
    if rule.is_default
        && matches!(
            rule.effect.target(),
            Some(Target::DataLabel(_) | Target::ColumnName(_))
        )
    {
        diagnostics.push(Diagnostic::DefaultRuleWithColumnFilter {
            location: location.clone(),
            action,
        });
    }

    let targets = rule.effect.targets().len();
    if action.requires_target() && targets == 0 {
        diagnostics.push(Diagnostic::EffectMissingTarget { location, action });
    } else if targets > 1 {
        diagnostics.push(Diagnostic::EffectAmbiguousTarget { location, action });
    }

    diagnostics
}

/// Check conditions and resolve every constant and predicate reference.
pub fn validate_references(generator: &Generator) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let defined_constants: Vec<String> = generator.constants.keys().cloned().collect();
    let defined_predicates: Vec<String> = generator.predicates.keys().cloned().collect();

    for (name, blocks) in &generator.predicates {
        let shared = blocks.len() > 1;
        for (block, predicate) in blocks.iter().enumerate() {
            for (i, condition) in predicate.conditions.iter().enumerate() {
                let location = Location::Condition {
                    predicate: name.clone(),
                    block: shared.then_some(block),
                    index: i,
                };
                diagnostics.extend(validate_condition(condition, &location));

                if let Some(constant) = condition.constant_ref() {
                    if !generator.constants.contains_key(constant) {
                        diagnostics.push(Diagnostic::UndefinedReference {
                            location,
                            kind: ReferenceKind::Constant,
                            name: constant.to_string(),
                            available: defined_constants.clone(),
                        });
                    }
                }
            }
        }
    }

    for rule in &generator.rules {
        for reference in &rule.when_all_of {
            if !generator.predicates.contains_key(&reference.name) {
                diagnostics.push(Diagnostic::UndefinedReference {
                    location: Location::Rule {
                        index: rule.index,
                        name: rule.name.clone(),
                    },
                    kind: ReferenceKind::Predicate,
                    name: reference.name.clone(),
                    available: defined_predicates.clone(),
                });
            }
        }
    }

    diagnostics
}

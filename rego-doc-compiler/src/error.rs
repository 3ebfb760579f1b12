//! Compiler error types
//!
//! Validation never stops at the first problem: every finding becomes a
//! [`Diagnostic`] and the whole list is returned as
//! [`CompilerError::Validation`].

use rego_doc_core::{Action, CoreError};
use std::fmt;
use thiserror::Error;

/// Where in the document a diagnostic was raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Constant { index: usize, name: String },
    Predicate { index: usize, name: String },
    /// `block` is set when several predicate blocks share the name
    Condition {
        predicate: String,
        block: Option<usize>,
        index: usize,
    },
    Rule { index: usize, name: String },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Constant { index, name } => write!(f, "constant[{}] {:?}", index, name),
            Location::Predicate { index, name } => write!(f, "predicate[{}] {:?}", index, name),
            Location::Condition {
                predicate,
                block: None,
                index,
            } => write!(f, "predicate {:?} condition[{}]", predicate, index),
            Location::Condition {
                predicate,
                block: Some(block),
                index,
            } => write!(f, "predicate {:?}[{}] condition[{}]", predicate, block, index),
            Location::Rule { index, name } => write!(f, "rule[{}] {:?}", index, name),
        }
    }
}

/// What an unresolved reference was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Constant,
    Predicate,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Constant => f.write_str("constant"),
            ReferenceKind::Predicate => f.write_str("predicate"),
        }
    }
}

/// Discriminant of a [`Diagnostic`], for matching without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    NameInvalid,
    NameReserved,
    NameConflict,
    MissingField,
    InvalidLiteral,
    InvalidPath,
    ConflictingValueSource,
    UndefinedReference,
    DefaultRuleWithCondition,
    DefaultRuleWithColumnFilter,
    EffectMissingTarget,
    EffectAmbiguousTarget,
}

/// A single problem found in a policy document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    #[error("{location}: {name:?} is not a valid identifier (use snake_case identifiers)")]
    NameInvalid { location: Location, name: String },

    #[error("{location}: {name:?} is a reserved name (use snake_case identifiers)")]
    NameReserved { location: Location, name: String },

    #[error("{location}: name already used by {existing} - choose a different name")]
    NameConflict { location: Location, existing: String },

    #[error("{location}: missing '{field}' - {hint}")]
    MissingField {
        location: Location,
        field: &'static str,
        hint: String,
    },

    #[error("{location}: value is not valid JSON - encode strings, lists and objects as JSON text")]
    InvalidLiteral { location: Location },

    #[error("{location}: {path:?} is not a valid variable path - use dotted identifiers (e.g., \"user.groups\")")]
    InvalidPath { location: Location, path: String },

    #[error("{location}: 'values' and 'constant' are mutually exclusive - use one or the other")]
    ConflictingValueSource { location: Location },

    #[error(
        "{location}: references undefined {kind} {name:?} - available {kind}s: [{}]",
        .available.join(", ")
    )]
    UndefinedReference {
        location: Location,
        kind: ReferenceKind,
        name: String,
        available: Vec<String>,
    },

    #[error("{location}: default rules cannot have 'when_all_of' - they define fallback behavior")]
    DefaultRuleWithCondition { location: Location },

    #[error("{location}: default {action} rules cannot filter columns - use 'all_columns = true' or move the 'data_label'/'column_name' target to a conditional rule")]
    DefaultRuleWithColumnFilter { location: Location, action: Action },

    #[error("{location}: {action} effect needs a target - add 'data_label', 'column_name', or 'all_columns = true' to the effect block")]
    EffectMissingTarget { location: Location, action: Action },

    #[error("{location}: {action} effect has more than one target - keep exactly one of 'data_label', 'column_name', or 'all_columns = true'")]
    EffectAmbiguousTarget { location: Location, action: Action },
}

impl Diagnostic {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Diagnostic::NameInvalid { .. } => DiagnosticKind::NameInvalid,
            Diagnostic::NameReserved { .. } => DiagnosticKind::NameReserved,
            Diagnostic::NameConflict { .. } => DiagnosticKind::NameConflict,
            Diagnostic::MissingField { .. } => DiagnosticKind::MissingField,
            Diagnostic::InvalidLiteral { .. } => DiagnosticKind::InvalidLiteral,
            Diagnostic::InvalidPath { .. } => DiagnosticKind::InvalidPath,
            Diagnostic::ConflictingValueSource { .. } => DiagnosticKind::ConflictingValueSource,
            Diagnostic::UndefinedReference { .. } => DiagnosticKind::UndefinedReference,
            Diagnostic::DefaultRuleWithCondition { .. } => DiagnosticKind::DefaultRuleWithCondition,
            Diagnostic::DefaultRuleWithColumnFilter { .. } => {
                DiagnosticKind::DefaultRuleWithColumnFilter
            }
            Diagnostic::EffectMissingTarget { .. } => DiagnosticKind::EffectMissingTarget,
            Diagnostic::EffectAmbiguousTarget { .. } => DiagnosticKind::EffectAmbiguousTarget,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Diagnostic::NameInvalid { location, .. }
            | Diagnostic::NameReserved { location, .. }
            | Diagnostic::NameConflict { location, .. }
            | Diagnostic::MissingField { location, .. }
            | Diagnostic::InvalidLiteral { location }
            | Diagnostic::InvalidPath { location, .. }
            | Diagnostic::ConflictingValueSource { location }
            | Diagnostic::UndefinedReference { location, .. }
            | Diagnostic::DefaultRuleWithCondition { location }
            | Diagnostic::DefaultRuleWithColumnFilter { location, .. }
            | Diagnostic::EffectMissingTarget { location, .. }
            | Diagnostic::EffectAmbiguousTarget { location, .. } => location,
        }
    }
}

/// Every diagnostic collected for one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(pub Vec<Diagnostic>);

impl Diagnostics {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn contains_kind(&self, kind: DiagnosticKind) -> bool {
        self.0.iter().any(|d| d.kind() == kind)
    }

    /// Human-readable messages, one per diagnostic
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Validation failed:\n{0}")]
    Validation(Diagnostics),

    #[error("Invalid document: {0}")]
    Document(#[from] CoreError),
}

impl CompilerError {
    /// The diagnostics behind a validation failure
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            CompilerError::Validation(diagnostics) => Some(diagnostics),
            CompilerError::Document(_) => None,
        }
    }
}

//! Policy document compiler
//!
//! Ties the pipeline together: load the document into a [`Generator`],
//! validate it, render Rego, and derive the content identifier.

use crate::error::{CompilerError, Diagnostics};
use crate::generator::Generator;
use crate::identity;
use rego_doc_core::PolicyDocument;
use serde::{Deserialize, Serialize};

/// Rendered Rego and its content identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPolicy {
    pub id: String,
    pub rego: String,
}

/// Compiler for declarative policy documents
pub struct RegoCompiler;

impl RegoCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile a document into Rego.
    ///
    /// Either every diagnostic for the document is returned, or the complete
    /// output; there is no partial result.
    pub fn compile(&self, document: &PolicyDocument) -> Result<CompiledPolicy, CompilerError> {
        let generator = self.prepare(document)?;
        let rego = generator.generate()?;
        let id = identity::derive_id(&rego);

        tracing::debug!(id = %id, bytes = rego.len(), "Generated Rego policy");

        Ok(CompiledPolicy { id, rego })
    }

    /// Parse a JSON document and compile it
    pub fn compile_json(&self, json: &str) -> Result<CompiledPolicy, CompilerError> {
        let document = PolicyDocument::from_json(json)?;
        self.compile(&document)
    }

    /// Validate a document without rendering it
    pub fn validate(&self, document: &PolicyDocument) -> Result<(), CompilerError> {
        self.prepare(document).map(|_| ())
    }

    fn prepare(&self, document: &PolicyDocument) -> Result<Generator, CompilerError> {
        let mut generator = Generator::from_document(document);
        generator.validate_references();

        if generator.is_valid() {
            return Ok(generator);
        }

        tracing::warn!(
            errors = generator.errors.len(),
            "Policy document failed validation"
        );
        Err(CompilerError::Validation(Diagnostics(generator.errors)))
    }
}

impl Default for RegoCompiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiagnosticKind;
    use rego_doc_core::{Condition, Constant, Effect, Operator, Predicate, Rule};

    fn integration_document() -> PolicyDocument {
        PolicyDocument {
            description: Some("Test policy".to_string()),
            included_connectors: vec!["test-connector".to_string()],
            constants: vec![Constant::new("allowed_groups", r#"["admin", "analyst"]"#)],
            predicates: vec![Predicate::new("is_authorized").with_condition(
                Condition::new(Operator::AnyIn)
                    .with_variable("user.groups")
                    .with_constant("allowed_groups"),
            )],
            rules: vec![
                Rule::default_for(
                    "session",
                    Effect::block().with_type("block_with_formal_message"),
                ),
                Rule::new("session", Effect::allow().with_reason("User is authorized"))
                    .when("is_authorized"),
            ],
            raw_rego: None,
        }
    }

    #[test]
    fn test_full_integration() {
        let compiled = RegoCompiler::new()
            .compile(&integration_document())
            .expect("compilation failed");

        let expected = r#"package formal.v2

import future.keywords.if
import future.keywords.in

# Test policy

included_connectors := ["test-connector"]

allowed_groups := ["admin", "analyst"]

is_authorized if {
    some _x in input.user.groups; _x in allowed_groups
}

session := { "action": "allow", "reason": "User is authorized" } if {
    is_authorized
}

default session := { "action": "block", "type": "block_with_formal_message" }
"#;
        assert_eq!(compiled.rego, expected);
        assert_eq!(compiled.id, identity::derive_id(expected));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = RegoCompiler::new();
        let first = compiler.compile(&integration_document()).unwrap();
        let second = compiler.compile(&integration_document()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_validation_blocks_generation() {
        let mut document = integration_document();
        document.rules.push(Rule::new("session", Effect::allow()).when("!is_owner"));
        document.constants.push(Constant::new("bad_json", "{"));

        let compiler = RegoCompiler::new();
        let err = compiler.compile(&document).unwrap_err();
        let diagnostics = err.diagnostics().expect("validation error");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.contains_kind(DiagnosticKind::InvalidLiteral));
        assert!(diagnostics.contains_kind(DiagnosticKind::UndefinedReference));
        assert!(compiler.validate(&document).is_err());
    }

    #[test]
    fn test_compile_json() {
        let json = r#"{
            "rules": [{ "name": "session", "default": true, "effect": { "action": "allow" } }]
        }"#;

        let compiled = RegoCompiler::new().compile_json(json).unwrap();
        assert!(compiled
            .rego
            .contains(r#"default session := { "action": "allow" }"#));
    }

    #[test]
    fn test_compile_json_rejects_malformed_input() {
        let err = RegoCompiler::new().compile_json("{ not json").unwrap_err();
        assert!(matches!(err, CompilerError::Document(_)));
        assert!(err.diagnostics().is_none());
    }
}

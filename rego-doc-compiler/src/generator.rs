//! Rego code generation
//!
//! Renders a validated [`Generator`] into Rego source. Output order is fully
//! determined by the input: constants and predicates are emitted by name,
//! rules by declaration order with defaults last. The same document always
//! yields byte-identical text.

use crate::error::{CompilerError, Diagnostic, Diagnostics, Location};
use crate::validator;
use rego_doc_core::{Condition, Effect, Operator, PolicyDocument, Predicate, Rule, Target};
use std::collections::{BTreeMap, HashSet};

/// Package every generated policy is declared in
pub const PACKAGE: &str = "formal.v2";

/// A policy document prepared for generation
#[derive(Debug, Clone, Default)]
pub struct Generator {
    pub description: Option<String>,
    pub included_connectors: Vec<String>,
    /// Constant name -> JSON literal
    pub constants: BTreeMap<String, String>,
    /// Predicate name -> every block declared under that name
    pub predicates: BTreeMap<String, Vec<Predicate>>,
    pub rules: Vec<Rule>,
    pub raw_rego: Option<String>,
    pub errors: Vec<Diagnostic>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a generator, recording per-declaration problems as it goes.
    ///
    /// Cross-references are not resolved here; call
    /// [`Generator::validate_references`] once the whole document is loaded.
    pub fn from_document(document: &PolicyDocument) -> Self {
        let mut generator = Self {
            description: document.description.clone(),
            included_connectors: document.included_connectors.clone(),
            raw_rego: document.raw_rego.clone(),
            ..Self::default()
        };

        for (index, constant) in document.constants.iter().enumerate() {
            generator
                .errors
                .extend(validator::validate_constant(index, constant));

            if generator.constants.contains_key(&constant.name) {
                generator.errors.push(Diagnostic::NameConflict {
                    location: Location::Constant {
                        index,
                        name: constant.name.clone(),
                    },
                    existing: "an earlier constant".to_string(),
                });
                continue;
            }
            generator
                .constants
                .insert(constant.name.clone(), constant.value.clone());
        }

        for (index, predicate) in document.predicates.iter().enumerate() {
            generator.errors.extend(validator::validate_predicate(
                index,
                predicate,
                &generator.constants,
            ));
            generator
                .predicates
                .entry(predicate.name.clone())
                .or_default()
                .push(predicate.clone());
        }

        let mut defaults = HashSet::new();
        for (index, rule) in document.rules.iter().enumerate() {
            let rule = rule.clone().at(index);
            generator.errors.extend(validator::validate_rule(&rule));

            let shadowed = if generator.predicates.contains_key(&rule.name) {
                Some("a predicate")
            } else if generator.constants.contains_key(&rule.name) {
                Some("a constant")
            } else {
                None
            };
            if let Some(existing) = shadowed {
                generator.errors.push(Diagnostic::NameConflict {
                    location: Location::Rule {
                        index,
                        name: rule.name.clone(),
                    },
                    existing: existing.to_string(),
                });
            }
            if rule.is_default && !defaults.insert(rule.name.clone()) {
                generator.errors.push(Diagnostic::NameConflict {
                    location: Location::Rule {
                        index,
                        name: rule.name.clone(),
                    },
                    existing: "an earlier default rule".to_string(),
                });
            }
            generator.rules.push(rule);
        }

        tracing::debug!(
            constants = generator.constants.len(),
            predicates = generator.predicates.len(),
            rules = generator.rules.len(),
            "Loaded policy document"
        );

        generator
    }

    /// Resolve constant and predicate references, appending any problems.
    pub fn validate_references(&mut self) {
        let diagnostics = validator::validate_references(self);
        self.errors.extend(diagnostics);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Render the policy, or return every diagnostic collected so far.
    pub fn generate(&self) -> Result<String, CompilerError> {
        if !self.errors.is_empty() {
            return Err(CompilerError::Validation(Diagnostics(self.errors.clone())));
        }
        Ok(self.render())
    }

    fn render(&self) -> String {
        let mut rego = String::new();

        rego.push_str(&format!("package {}\n\n", PACKAGE));

        let needs_if = !self.predicates.is_empty() || !self.rules.is_empty();
        let needs_in = self.uses_membership_operator();

        if needs_if {
            rego.push_str("import future.keywords.if\n");
        }
        if needs_in {
            rego.push_str("import future.keywords.in\n");
        }
        if needs_if || needs_in {
            rego.push('\n');
        }

        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            for line in description.lines() {
                rego.push_str(format!("# {}", line).trim_end());
                rego.push('\n');
            }
            rego.push('\n');
        }

        if !self.included_connectors.is_empty() {
            let connectors = serde_json::Value::from(self.included_connectors.clone());
            rego.push_str(&format!("included_connectors := {}\n\n", connectors));
        }

        if !self.constants.is_empty() {
            for (name, value) in &self.constants {
                rego.push_str(&format!("{} := {}\n", name, value));
            }
            rego.push('\n');
        }

        for blocks in self.predicates.values() {
            for predicate in blocks {
                rego.push_str(&render_predicate(predicate));
                rego.push('\n');
            }
        }

        if let Some(raw) = self.raw_rego.as_deref().filter(|r| !r.is_empty()) {
            rego.push_str(raw);
            rego.push_str("\n\n");
        }

        let mut rules: Vec<&Rule> = self.rules.iter().collect();
        rules.sort_by_key(|rule| (rule.is_default, rule.index));
        for rule in rules {
            rego.push_str(&render_rule(rule));
            rego.push('\n');
        }

        format!("{}\n", rego.trim_end_matches('\n'))
    }

    fn uses_membership_operator(&self) -> bool {
        self.predicates
            .values()
            .flatten()
            .flat_map(|predicate| &predicate.conditions)
            .any(|condition| condition.operator.is_membership())
    }
}

fn render_predicate(predicate: &Predicate) -> String {
    let mut rego = format!("{} if {{\n", predicate.name);
    for condition in &predicate.conditions {
        rego.push_str(&format!("    {}\n", compile_condition(condition)));
    }
    rego.push_str("}\n");
    rego
}

/// Compile one condition into a single Rego expression
pub fn compile_condition(condition: &Condition) -> String {
    let path = match condition.variable_path() {
        Some(variable) => format!("input.{}", variable),
        None => "input".to_string(),
    };
    let value = comparand(condition);

    match condition.operator {
        Operator::Equals => format!("{} == {}", path, value),
        Operator::NotEquals => format!("{} != {}", path, value),
        Operator::In => format!("{} in {}", path, value),
        Operator::NotIn => format!("not {} in {}", path, value),
        Operator::AnyIn => format!("some _x in {}; _x in {}", path, value),
        Operator::AllIn => format!("every _x in {} {{ _x in {} }}", path, value),
        Operator::NoneIn => format!("not (some _x in {}; _x in {})", path, value),
        Operator::Contains => format!("contains({}, {})", path, value),
        Operator::NotContains => format!("not contains({}, {})", path, value),
        Operator::StartsWith => format!("startswith({}, {})", path, value),
        Operator::EndsWith => format!("endswith({}, {})", path, value),
        Operator::Regex => format!("regex.match({}, {})", value, path),
        Operator::GreaterThan => format!("{} > {}", path, value),
        Operator::LessThan => format!("{} < {}", path, value),
        Operator::GreaterThanOrEqual => format!("{} >= {}", path, value),
        Operator::LessThanOrEqual => format!("{} <= {}", path, value),
        Operator::Exists => path,
        Operator::NotExists => format!("not {}", path),
    }
}

fn comparand(condition: &Condition) -> String {
    if let Some(constant) = condition.constant_ref() {
        return constant.to_string();
    }

    match condition.values.as_slice() {
        [] => String::new(),
        [single] if !condition.operator.is_membership() => format_value(single),
        values => {
            let parts: Vec<String> = values.iter().map(|v| format_value(v)).collect();
            format!("[{}]", parts.join(", "))
        }
    }
}

fn render_rule(rule: &Rule) -> String {
    let effect = render_effect(&rule.effect);

    if rule.is_default {
        return format!("default {} := {}\n", rule.name, effect);
    }

    let mut body: Vec<String> = rule
        .when_all_of
        .iter()
        .map(|reference| {
            if reference.negated {
                format!("not {}", reference.name)
            } else {
                reference.name.clone()
            }
        })
        .collect();

    if let Some(binding) = target_binding(&rule.effect) {
        body.push(binding);
    }
    // Rego rejects an empty rule body
    if body.is_empty() {
        body.push("true".to_string());
    }

    let mut rego = format!("{} := {} if {{\n", rule.name, effect);
    for line in body {
        rego.push_str(&format!("    {}\n", line));
    }
    rego.push_str("}\n");
    rego
}

fn render_effect(effect: &Effect) -> String {
    let mut parts = vec![format!(r#""action": {}"#, quote(effect.action.as_str()))];

    let metadata = [
        ("type", &effect.effect_type),
        ("sub_type", &effect.sub_type),
        ("typesafe", &effect.typesafe),
        ("message", &effect.message),
        ("reason", &effect.reason),
    ];
    for (key, value) in metadata {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            parts.push(format!(r#""{}": {}"#, key, quote(value)));
        }
    }

    match effect.target() {
        Some(Target::AllColumns) => parts.push(r#""columns": input.columns"#.to_string()),
        Some(_) => parts.push(r#""columns": columns"#.to_string()),
        None => {}
    }

    format!("{{ {} }}", parts.join(", "))
}

fn target_binding(effect: &Effect) -> Option<String> {
    let matcher = match effect.target()? {
        Target::AllColumns => return None,
        Target::DataLabel(label) => format!(r#"col["data_label"] == {}"#, quote(label)),
        Target::ColumnName(column) => format!(r#"col["name"] == {}"#, quote(column)),
    };
    Some(format!(
        "columns := [col | col := input.columns[_]; {}]",
        matcher
    ))
}

/// Emit JSON literals as-is and everything else as a quoted string
fn format_value(value: &str) -> String {
    if validator::is_json_literal(value) {
        value.to_string()
    } else {
        quote(value)
    }
}

fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

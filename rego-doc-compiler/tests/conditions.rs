//! Condition compiler, identifier and variable path rules
//!
//! Run with: cargo test --test conditions -p rego-doc-compiler

use rego_doc_compiler::{compile_condition, is_variable_path, validate_identifier, NameError};
use rego_doc_core::{Condition, Operator};
use rstest::rstest;

fn condition(operator: &str, variable: &str, values: &[&str]) -> Condition {
    let operator: Operator = operator.parse().expect("known operator");
    Condition::new(operator)
        .with_variable(variable)
        .with_values(values.iter().copied())
}

#[rstest]
#[case("equals", "user.name", &["alice"], r#"input.user.name == "alice""#)]
#[case("not_equals", "user.name", &["bob"], r#"input.user.name != "bob""#)]
#[case("in", "user.role", &["admin", "user"], r#"input.user.role in ["admin", "user"]"#)]
#[case("not_in", "user.role", &["guest"], r#"not input.user.role in ["guest"]"#)]
#[case("any_in", "user.groups", &["admin"], r#"some _x in input.user.groups; _x in ["admin"]"#)]
#[case("all_in", "user.groups", &["a", "b"], r#"every _x in input.user.groups { _x in ["a", "b"] }"#)]
#[case("none_in", "user.groups", &["admin"], r#"not (some _x in input.user.groups; _x in ["admin"])"#)]
#[case("greater_than", "user.age", &["18"], "input.user.age > 18")]
#[case("less_than", "user.score", &["100"], "input.user.score < 100")]
#[case("greater_than_or_equal", "user.level", &["3"], "input.user.level >= 3")]
#[case("less_than_or_equal", "user.level", &["7.5"], "input.user.level <= 7.5")]
#[case("contains", "user.email", &["@company.com"], r#"contains(input.user.email, "@company.com")"#)]
#[case("not_contains", "user.email", &["spam"], r#"not contains(input.user.email, "spam")"#)]
#[case("starts_with", "resource.name", &["prod-"], r#"startswith(input.resource.name, "prod-")"#)]
#[case("ends_with", "resource.name", &["-db"], r#"endswith(input.resource.name, "-db")"#)]
#[case("regex", "user.email", &[".*@company.com"], r#"regex.match(".*@company.com", input.user.email)"#)]
#[case("exists", "user.verified", &[], "input.user.verified")]
#[case("not_exists", "user.banned", &[], "not input.user.banned")]
fn operator_templates(
    #[case] operator: &str,
    #[case] variable: &str,
    #[case] values: &[&str],
    #[case] expected: &str,
) {
    assert_eq!(compile_condition(&condition(operator, variable, values)), expected);
}

#[rstest]
#[case("true", "input.user.active == true")]
#[case("null", "input.user.active == null")]
#[case(r#""quoted""#, r#"input.user.active == "quoted""#)]
#[case(r#"{"tier": 1}"#, r#"input.user.active == {"tier": 1}"#)]
#[case("not json", r#"input.user.active == "not json""#)]
fn single_literals_keep_json(#[case] value: &str, #[case] expected: &str) {
    assert_eq!(compile_condition(&condition("equals", "user.active", &[value])), expected);
}

#[rstest]
#[case("in")]
#[case("not_in")]
#[case("any_in")]
#[case("all_in")]
#[case("none_in")]
fn membership_wraps_single_value(#[case] operator: &str) {
    let rendered = compile_condition(&condition(operator, "user.groups", &["admin"]));
    assert!(rendered.contains(r#"["admin"]"#), "{}", rendered);
}

#[rstest]
#[case("any_in")]
#[case("equals")]
#[case("not_in")]
fn constant_is_referenced_by_name(#[case] operator: &str) {
    let rendered = compile_condition(
        &Condition::new(operator.parse().unwrap())
            .with_variable("user.groups")
            .with_constant("allowed_groups"),
    );
    assert!(rendered.ends_with("allowed_groups"), "{}", rendered);
    assert!(!rendered.contains('['), "{}", rendered);
}

#[test]
fn existence_without_path_tests_input_root() {
    assert_eq!(compile_condition(&Condition::new(Operator::Exists)), "input");
    assert_eq!(compile_condition(&Condition::new(Operator::NotExists)), "not input");
}

#[rstest]
#[case("is_admin")]
#[case("hasGroup")]
#[case("check_123")]
#[case("_private")]
fn valid_identifiers(#[case] name: &str) {
    assert_eq!(validate_identifier(name), Ok(()));
}

#[rstest]
#[case("123start")]
#[case("has-dash")]
#[case("has space")]
#[case("has.dot")]
#[case("")]
fn invalid_identifiers(#[case] name: &str) {
    assert_eq!(validate_identifier(name), Err(NameError::Invalid));
}

#[rstest]
#[case("input")]
#[case("data")]
#[case("default")]
#[case("some")]
#[case("every")]
#[case("startswith")]
fn reserved_identifiers(#[case] name: &str) {
    assert_eq!(validate_identifier(name), Err(NameError::Reserved));
}

#[rstest]
#[case("user")]
#[case("user.groups")]
#[case("resource.owner_id")]
#[case("_meta.tags.env2")]
fn valid_variable_paths(#[case] path: &str) {
    assert!(is_variable_path(path));
}

#[rstest]
#[case("")]
#[case("user.")]
#[case(".user")]
#[case("user..groups")]
#[case("user.groups[0]")]
#[case("user.2fa")]
#[case("user groups")]
#[case("x\n}\nallow := true if {\n  true")]
#[case("x }")]
fn invalid_variable_paths(#[case] path: &str) {
    assert!(!is_variable_path(path));
}

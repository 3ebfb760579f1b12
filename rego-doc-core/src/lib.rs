//! Core domain models for Rego Doc
//!
//! This crate contains the typed policy document that the compiler
//! consumes: constants, conditions, predicates, effects, and rules.

pub mod error;
pub mod models;

pub use error::CoreError;
pub use models::*;

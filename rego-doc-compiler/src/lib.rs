//! Compiler for declarative Rego policy documents
//!
//! This crate validates a [`rego_doc_core::PolicyDocument`], renders it to
//! Rego source, and derives a stable content identifier for the result.

pub mod compiler;
pub mod error;
pub mod generator;
pub mod identity;
pub mod validator;

pub use compiler::{CompiledPolicy, RegoCompiler};
pub use error::{CompilerError, Diagnostic, DiagnosticKind, Diagnostics, Location, ReferenceKind};
pub use generator::{compile_condition, Generator};
pub use identity::derive_id;
pub use validator::{is_variable_path, validate_identifier, NameError};

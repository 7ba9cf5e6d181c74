//! Contracts for payloads that cross a stage boundary.
//!
//! - [`schema`]: declarative object schemas and the validator used for
//!   trigger inputs, tool arguments and structured agent replies
//! - [`typed_output`]: typed record conversions for stage results

pub mod schema;
pub mod typed_output;

pub use schema::{json_type_name, validate, FieldSpec, FieldType, Schema};
pub use typed_output::{extract_field, IntoStageResult, TypedStageResult};

//! The immutable payload that starts a run.

use crate::contracts::Schema;
use crate::errors::{ContextError, ValidationError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A validated trigger payload.
///
/// The only way to obtain one is through [`TriggerInput::validated`], so a
/// `TriggerInput` always satisfies its pipeline's input schema and carries
/// the schema's defaults. It exposes read-only accessors only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerInput {
    schema: String,
    fields: Map<String, Value>,
}

impl TriggerInput {
    /// Validates `raw` against `schema` and freezes the result.
    pub fn validated(schema: &Schema, raw: &Value) -> Result<Self, ValidationError> {
        match schema.validate(raw)? {
            Value::Object(fields) => Ok(Self {
                schema: schema.name.clone(),
                fields,
            }),
            other => Err(ValidationError::new(
                "$",
                format!("expected object, got {}", crate::contracts::json_type_name(&other)),
            )),
        }
    }

    /// Returns the name of the schema the payload was validated against.
    #[must_use]
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Gets a string field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Gets a boolean field.
    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.fields.get(key).and_then(Value::as_bool)
    }

    /// Gets a numeric field.
    #[must_use]
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// Gets an integer field.
    #[must_use]
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.fields.get(key).and_then(Value::as_i64)
    }

    /// Gets a string field that must be present.
    pub fn require_str(&self, key: &str) -> Result<&str, ContextError> {
        match self.fields.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(_) => Err(ContextError::FieldType {
                stage: "trigger".to_string(),
                key: key.to_string(),
                expected: "a string".to_string(),
            }),
            None => Err(ContextError::MissingField {
                stage: "trigger".to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Deserializes the whole payload into a typed record.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    /// Returns the payload as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

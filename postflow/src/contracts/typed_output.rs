//! Conversions between typed records and [`StageResult`]s.
//!
//! Stages exchange control data (file paths, post ids, category ids) as
//! typed fields of structured records. These helpers serialize a record into
//! a result, optionally validating it against an output [`Schema`], and pull
//! typed fields back out.

use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;

use super::schema::Schema;
use crate::core::StageResult;
use crate::errors::ValidationError;

/// Typed stage result builder with optional schema validation.
#[derive(Debug)]
pub struct TypedStageResult<T> {
    schema: Option<Schema>,
    _marker: PhantomData<T>,
}

impl<T> TypedStageResult<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Creates a handler without an output schema.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schema: None,
            _marker: PhantomData,
        }
    }

    /// Creates a handler that validates every record against `schema`.
    #[must_use]
    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema: Some(schema),
            _marker: PhantomData,
        }
    }

    /// Serializes and validates a record into a stage result.
    pub fn ok(&self, payload: &T) -> Result<StageResult, ValidationError> {
        let value = serde_json::to_value(payload)
            .map_err(|e| ValidationError::new("$", format!("serialization error: {e}")))?;
        let value = match self.schema {
            Some(ref schema) => schema.validate(&value)?,
            None => value,
        };
        match value {
            serde_json::Value::Object(map) => Ok(StageResult::from_map(map)),
            _ => Err(ValidationError::new("$", "payload must serialize to an object")),
        }
    }

    /// Validates a stage result and deserializes it into a record.
    pub fn parse(&self, result: &StageResult) -> Result<T, ValidationError> {
        let value = match self.schema {
            Some(ref schema) => schema.validate(&result.to_value())?,
            None => result.to_value(),
        };
        serde_json::from_value(value)
            .map_err(|e| ValidationError::new("$", format!("deserialization error: {e}")))
    }
}

impl<T> Default for TypedStageResult<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for records that can become a stage result.
pub trait IntoStageResult {
    /// Converts to a stage result.
    fn into_stage_result(self) -> Result<StageResult, ValidationError>;
}

impl<T: Serialize> IntoStageResult for T {
    fn into_stage_result(self) -> Result<StageResult, ValidationError> {
        match serde_json::to_value(&self) {
            Ok(serde_json::Value::Object(map)) => Ok(StageResult::from_map(map)),
            Ok(_) => Err(ValidationError::new("$", "payload must serialize to an object")),
            Err(e) => Err(ValidationError::new("$", format!("serialization error: {e}"))),
        }
    }
}

/// Extracts a typed field from a stage result.
pub fn extract_field<T: DeserializeOwned>(
    result: &StageResult,
    field: &str,
) -> Result<T, ValidationError> {
    let value = result.get(field).ok_or_else(|| ValidationError::missing(field))?;

    serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::new(field, format!("invalid type: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::schema::FieldSpec;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct AudioFile {
        file_path: String,
        duration_ms: u64,
    }

    #[test]
    fn test_into_stage_result() {
        let result = AudioFile {
            file_path: "/tmp/a.mp3".to_string(),
            duration_ms: 800,
        }
        .into_stage_result()
        .unwrap();

        assert_eq!(result.get_str("file_path"), Some("/tmp/a.mp3"));
        assert_eq!(extract_field::<u64>(&result, "duration_ms").unwrap(), 800);
    }

    #[test]
    fn test_scalar_payload_rejected() {
        let err = "just text".into_stage_result().unwrap_err();
        assert_eq!(err.field, "$");
    }

    #[test]
    fn test_extract_missing_field() {
        let err = extract_field::<String>(&StageResult::empty(), "file_path").unwrap_err();
        assert_eq!(err.field, "file_path");
    }

    #[test]
    fn test_typed_result_with_schema() {
        let schema = Schema::new("audio")
            .field(FieldSpec::string("file_path").required())
            .field(FieldSpec::integer("duration_ms").at_least(0.0));
        let typed: TypedStageResult<AudioFile> = TypedStageResult::with_schema(schema);

        let payload = AudioFile {
            file_path: "/tmp/a.mp3".to_string(),
            duration_ms: 10,
        };
        let result = typed.ok(&payload).unwrap();
        assert_eq!(typed.parse(&result).unwrap(), payload);

        let bad = StageResult::single("duration_ms", 10);
        assert_eq!(typed.parse(&bad).unwrap_err().field, "file_path");
    }
}

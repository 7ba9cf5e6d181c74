//! Immutable stage result records.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// The output record of one stage.
///
/// A `StageResult` is built once by the stage that produced it and is never
/// mutated afterwards; the runner commits it into the run context under the
/// stage's name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    /// Stage-specific fields.
    data: Map<String, Value>,
    /// Free-form annotations (model used, token counts, degraded flags).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, Value>,
}

impl StageResult {
    /// Creates an empty result.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a result holding a single field.
    #[must_use]
    pub fn single(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::empty().with(key, value)
    }

    /// Creates a result from a JSON object map.
    #[must_use]
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data,
            metadata: HashMap::new(),
        }
    }

    /// Creates a result from any JSON value. Non-object values are stored
    /// under `"value"`.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Self::single("value", other),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Gets a field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string field.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Gets a metadata entry.
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Returns true if the result has the given field.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Returns the field names.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the result has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the fields as a JSON object.
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Returns a borrowed view of the fields.
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Deserializes the fields into a typed record.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }
}

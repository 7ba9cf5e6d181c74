//! Declarative object schemas and a pure validator.
//!
//! A [`Schema`] describes the fields of a JSON object: primitive type,
//! whether the field is required, a default for optional fields, enumerated
//! choices, numeric bounds and minimum lengths. [`validate`] checks a value
//! against a schema and returns the value with defaults filled in.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Primitive JSON type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// A JSON string.
    String,
    /// A JSON number without a fractional part.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl FieldType {
    /// Returns the JSON Schema name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Returns true if `value` has this type.
    #[must_use]
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one field of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Expected type.
    pub field_type: FieldType,
    /// Whether the field must be present.
    #[serde(default)]
    pub required: bool,
    /// Value used when an optional field is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Allowed string values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Minimum string length (characters) or array length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Element type for arrays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<FieldType>,
    /// Human-readable description, surfaced in tool catalogues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    /// Creates an optional field of the given type.
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            choices: None,
            min: None,
            max: None,
            min_length: None,
            items: None,
            description: None,
        }
    }

    /// Creates a string field.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    /// Creates an integer field.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Integer)
    }

    /// Creates a number field.
    #[must_use]
    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Number)
    }

    /// Creates a boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Boolean)
    }

    /// Creates an array field with the given element type.
    #[must_use]
    pub fn array(name: impl Into<String>, items: FieldType) -> Self {
        let mut spec = Self::new(name, FieldType::Array);
        spec.items = Some(items);
        spec
    }

    /// Creates an object field.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Object)
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default for an absent optional field.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restricts a string field to a fixed set of values.
    #[must_use]
    pub fn one_of(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| (*c).to_string()).collect());
        self
    }

    /// Sets inclusive numeric bounds.
    #[must_use]
    pub fn between(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets an inclusive lower bound.
    #[must_use]
    pub fn at_least(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets a minimum length for strings or arrays.
    #[must_use]
    pub fn with_min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn check(&self, value: &Value) -> Result<(), ValidationError> {
        if !self.field_type.matches(value) {
            return Err(ValidationError::new(
                &self.name,
                format!("expected {}, got {}", self.field_type, json_type_name(value)),
            ));
        }

        if let (Some(choices), Some(s)) = (&self.choices, value.as_str()) {
            if !choices.iter().any(|c| c == s) {
                return Err(ValidationError::new(
                    &self.name,
                    format!("'{s}' is not one of [{}]", choices.join(", ")),
                ));
            }
        }

        if let Some(n) = value.as_f64() {
            if let Some(min) = self.min {
                if n < min {
                    return Err(ValidationError::new(&self.name, format!("{n} is below minimum {min}")));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(ValidationError::new(&self.name, format!("{n} is above maximum {max}")));
                }
            }
        }

        if let Some(min_len) = self.min_length {
            let len = match value {
                Value::String(s) => Some(s.chars().count()),
                Value::Array(items) => Some(items.len()),
                _ => None,
            };
            if let Some(len) = len {
                if len < min_len {
                    return Err(ValidationError::new(
                        &self.name,
                        format!("length {len} is shorter than {min_len}"),
                    ));
                }
            }
        }

        if let (Some(item_type), Value::Array(items)) = (self.items, value) {
            for (i, item) in items.iter().enumerate() {
                if !item_type.matches(item) {
                    return Err(ValidationError::new(
                        format!("{}.{i}", self.name),
                        format!("expected {item_type}, got {}", json_type_name(item)),
                    ));
                }
            }
        }

        Ok(())
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = Map::new();
        prop.insert("type".to_string(), Value::String(self.field_type.as_str().to_string()));
        if let Some(ref d) = self.description {
            prop.insert("description".to_string(), Value::String(d.clone()));
        }
        if let Some(ref choices) = self.choices {
            prop.insert("enum".to_string(), serde_json::json!(choices));
        }
        if let Some(min) = self.min {
            prop.insert("minimum".to_string(), serde_json::json!(min));
        }
        if let Some(max) = self.max {
            prop.insert("maximum".to_string(), serde_json::json!(max));
        }
        if let Some(ref default) = self.default {
            prop.insert("default".to_string(), default.clone());
        }
        if let Some(items) = self.items {
            prop.insert("items".to_string(), serde_json::json!({ "type": items.as_str() }));
        }
        Value::Object(prop)
    }
}

/// A declared object shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name, used in diagnostics.
    pub name: String,
    /// Declared fields in declaration order.
    pub fields: Vec<FieldSpec>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a value against this schema.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        validate(self, value)
    }

    /// Renders the schema as a JSON Schema object, for model tool catalogues.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Validates `value` against `schema`.
///
/// Returns a copy of the object with defaults inserted for absent optional
/// fields. Fields not declared by the schema are passed through unchanged.
/// An explicit `null` counts as absent.
pub fn validate(schema: &Schema, value: &Value) -> Result<Value, ValidationError> {
    let Value::Object(input) = value else {
        return Err(ValidationError::new(
            "$",
            format!("expected object, got {}", json_type_name(value)),
        ));
    };

    let mut output = input.clone();

    for spec in &schema.fields {
        match input.get(&spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    return Err(ValidationError::missing(&spec.name));
                }
                if let Some(ref default) = spec.default {
                    output.insert(spec.name.clone(), default.clone());
                } else {
                    output.remove(&spec.name);
                }
            }
            Some(present) => spec.check(present)?,
        }
    }

    Ok(Value::Object(output))
}

/// Returns the JSON type name of a value.
#[must_use]
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

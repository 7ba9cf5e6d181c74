//! Error types for postflow.
//!
//! Every failure a run can report lives here: trigger and payload validation,
//! pipeline definition problems, run-context misuse, agent invocation
//! failures, and the typed failures of each external adapter.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for postflow operations.
#[derive(Debug, Error)]
pub enum PostflowError {
    /// A payload did not match its declared schema.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A pipeline definition is malformed.
    #[error("{0}")]
    Definition(#[from] PipelineDefinitionError),

    /// A run context was misused.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A model call made on behalf of an agent failed.
    #[error("{0}")]
    Agent(#[from] AgentInvocationError),

    /// An external adapter failed.
    #[error("{0}")]
    Adapter(#[from] AdapterError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A stage failed for a reason of its own.
    #[error("Stage '{stage}' failed: {message}")]
    Stage {
        /// The failing stage.
        stage: String,
        /// What went wrong.
        message: String,
    },

    /// The run was cancelled.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PostflowError {
    /// Creates a stage-specific failure.
    #[must_use]
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns a short machine-readable kind, used in events and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Definition(_) => "definition",
            Self::Context(_) => "context",
            Self::Agent(_) => "agent_invocation",
            Self::Adapter(e) => e.kind(),
            Self::Config(_) => "config",
            Self::Stage { .. } => "stage",
            Self::Cancelled(_) => "cancelled",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
        }
    }

    /// Returns the validation error if this is one.
    #[must_use]
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Self::Validation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PostflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Raised when a value does not satisfy its schema.
///
/// `field` is a dotted path into the value (`"topic"`, `"links.0.url"`);
/// `"$"` designates the value itself.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Validation failed for field '{field}': {reason}")]
pub struct ValidationError {
    /// Path of the offending field.
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an error for a missing required field.
    #[must_use]
    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "required field is missing")
    }

    /// Prefixes the field path with a parent segment.
    #[must_use]
    pub fn nested_under(mut self, parent: &str) -> Self {
        if self.field == "$" {
            self.field = parent.to_string();
        } else {
            self.field = format!("{parent}.{}", self.field);
        }
        self
    }
}

/// Metadata about a definition error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-002-DUPLICATE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when a pipeline definition is rejected by the builder.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineDefinitionError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Diagnostic info.
    pub error_info: ContractErrorInfo,
}

impl PipelineDefinitionError {
    /// A pipeline must declare at least one stage.
    #[must_use]
    pub fn empty(pipeline: &str) -> Self {
        Self {
            message: format!("Pipeline '{pipeline}' has no stages"),
            stages: Vec::new(),
            error_info: ContractErrorInfo::new("PIPELINE-001-EMPTY", "Pipeline has no stages")
                .with_fix_hint("Add at least one stage before calling build()")
                .with_context_entry("pipeline", pipeline),
        }
    }

    /// Two stages share a name.
    #[must_use]
    pub fn duplicate_stage(pipeline: &str, stage: &str) -> Self {
        Self {
            message: format!("Stage '{stage}' is declared more than once in pipeline '{pipeline}'"),
            stages: vec![stage.to_string()],
            error_info: ContractErrorInfo::new("PIPELINE-002-DUPLICATE", "Duplicate stage name")
                .with_fix_hint("Give every stage a unique name; results are keyed by stage name")
                .with_context_entry("pipeline", pipeline)
                .with_context_entry("stage", stage),
        }
    }

    /// A stage name is empty or whitespace.
    #[must_use]
    pub fn blank_stage_name(pipeline: &str) -> Self {
        Self {
            message: format!("Pipeline '{pipeline}' contains a stage with an empty name"),
            stages: Vec::new(),
            error_info: ContractErrorInfo::new("PIPELINE-003-BLANK-NAME", "Stage name is empty")
                .with_fix_hint("Stage names must contain at least one non-whitespace character")
                .with_context_entry("pipeline", pipeline),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = self.error_info.to_dict();
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        map
    }
}

/// Errors raised by the run context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// A result was committed twice under the same stage name.
    #[error("Result for stage '{stage}' has already been committed")]
    DuplicateStage {
        /// The stage name.
        stage: String,
    },

    /// A stage read a result that is not visible to it.
    #[error("Stage '{stage}' cannot read '{requested}': not a preceding stage")]
    UndeclaredStage {
        /// The reading stage.
        stage: String,
        /// The stage it tried to read.
        requested: String,
    },

    /// A required field is absent from a stage result.
    #[error("Stage result '{stage}' has no field '{key}'")]
    MissingField {
        /// The result's stage.
        stage: String,
        /// The missing key.
        key: String,
    },

    /// A field has an unexpected type.
    #[error("Field '{key}' of stage result '{stage}' is not {expected}")]
    FieldType {
        /// The result's stage.
        stage: String,
        /// The field key.
        key: String,
        /// The expected type.
        expected: String,
    },
}

/// Failure of a model call made on behalf of an agent.
#[derive(Debug, Clone, Error)]
pub enum AgentInvocationError {
    /// The model provider failed (timeout, quota, transport).
    #[error("Agent '{agent}' model call failed: {message}")]
    Model {
        /// The agent name.
        agent: String,
        /// The underlying cause.
        message: String,
    },

    /// The model answered with something unusable.
    #[error("Agent '{agent}' returned a malformed response: {message}")]
    MalformedResponse {
        /// The agent name.
        agent: String,
        /// What was wrong with it.
        message: String,
    },

    /// The model kept requesting tools past the configured limit.
    #[error("Agent '{agent}' exceeded {limit} tool rounds")]
    ToolRoundsExceeded {
        /// The agent name.
        agent: String,
        /// The configured limit.
        limit: usize,
    },
}

impl AgentInvocationError {
    /// Returns the agent the error belongs to.
    #[must_use]
    pub fn agent(&self) -> &str {
        match self {
            Self::Model { agent, .. }
            | Self::MalformedResponse { agent, .. }
            | Self::ToolRoundsExceeded { agent, .. } => agent,
        }
    }
}

/// Typed failures of external adapters.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdapterError {
    /// The search provider could not answer.
    #[error("Search unavailable: {message}")]
    SearchUnavailable {
        /// The cause.
        message: String,
    },

    /// A URL could not be fetched or parsed.
    #[error("Fetch of '{url}' failed: {message}")]
    FetchFailed {
        /// The requested URL.
        url: String,
        /// The cause.
        message: String,
    },

    /// Audio, image or video generation failed.
    #[error("Media generation '{operation}' failed: {message}")]
    MediaGenerationFailed {
        /// The media operation, e.g. `generate_audio`.
        operation: String,
        /// The cause.
        message: String,
    },

    /// A publish or datastore write failed.
    #[error("Publish to {target} failed: {message}")]
    PublishFailed {
        /// The publish target, e.g. `wordpress`.
        target: String,
        /// The cause.
        message: String,
    },

    /// The requested category does not exist on the target.
    #[error("Category {category} is not valid for {target}")]
    CategoryInvalid {
        /// The publish target.
        target: String,
        /// The rejected category.
        category: String,
    },
}

impl AdapterError {
    /// Creates a search failure.
    #[must_use]
    pub fn search_unavailable(message: impl Into<String>) -> Self {
        Self::SearchUnavailable {
            message: message.into(),
        }
    }

    /// Creates a fetch failure.
    #[must_use]
    pub fn fetch_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a media failure.
    #[must_use]
    pub fn media_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MediaGenerationFailed {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a publish failure.
    #[must_use]
    pub fn publish_failed(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a category failure.
    #[must_use]
    pub fn category_invalid(target: impl Into<String>, category: impl ToString) -> Self {
        Self::CategoryInvalid {
            target: target.into(),
            category: category.to_string(),
        }
    }

    /// Returns a short machine-readable kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SearchUnavailable { .. } => "search_unavailable",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::MediaGenerationFailed { .. } => "media_generation_failed",
            Self::PublishFailed { .. } => "publish_failed",
            Self::CategoryInvalid { .. } => "category_invalid",
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required setting is absent.
    #[error("Missing configuration value '{key}'")]
    Missing {
        /// The setting name.
        key: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid configuration value '{key}': {reason}")]
    Invalid {
        /// The setting name.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration file could not be read or parsed.
    #[error("Configuration file error: {0}")]
    File(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::missing("topic");
        assert_eq!(err.field, "topic");
        assert!(err.to_string().contains("topic"));
    }

    #[test]
    fn test_validation_error_nesting() {
        let err = ValidationError::new("url", "wrong type").nested_under("links.0");
        assert_eq!(err.field, "links.0.url");

        let root = ValidationError::new("$", "expected string").nested_under("title");
        assert_eq!(root.field, "title");
    }

    #[test]
    fn test_definition_error_codes() {
        let err = PipelineDefinitionError::duplicate_stage("blog", "writer");
        assert_eq!(err.error_info.code, "PIPELINE-002-DUPLICATE");
        assert_eq!(err.stages, vec!["writer".to_string()]);

        let dict = err.to_dict();
        assert_eq!(dict.get("code"), Some(&serde_json::json!("PIPELINE-002-DUPLICATE")));
        assert!(dict.contains_key("fix_hint"));
        assert!(dict.contains_key("context"));
    }

    #[test]
    fn test_empty_pipeline_error() {
        let err = PipelineDefinitionError::empty("blog");
        assert!(err.to_string().contains("no stages"));
        assert_eq!(err.error_info.code, "PIPELINE-001-EMPTY");
    }

    #[test]
    fn test_adapter_error_kinds() {
        assert_eq!(AdapterError::search_unavailable("down").kind(), "search_unavailable");
        assert_eq!(AdapterError::category_invalid("wordpress", 99).kind(), "category_invalid");

        let err: PostflowError = AdapterError::fetch_failed("https://x", "timeout").into();
        assert_eq!(err.kind(), "fetch_failed");
    }

    #[test]
    fn test_adapter_error_serializes_with_kind_tag() {
        let err = AdapterError::publish_failed("wordpress", "500");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["kind"], "publish_failed");
        assert_eq!(value["target"], "wordpress");
    }

    #[test]
    fn test_agent_error_agent_name() {
        let err = AgentInvocationError::ToolRoundsExceeded {
            agent: "writer".to_string(),
            limit: 4,
        };
        assert_eq!(err.agent(), "writer");
        assert!(err.to_string().contains('4'));
    }

    #[test]
    fn test_serde_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: PostflowError = parse.unwrap_err().into();
        assert_eq!(err.kind(), "serialization");
    }
}

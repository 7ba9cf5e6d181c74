//! Read-only view of prior stage results with strictness enforcement.

use super::RunContext;
use crate::core::StageResult;
use crate::errors::{ContextError, PostflowError};
use serde::de::DeserializeOwned;

/// The results a stage is allowed to read.
///
/// The view borrows the run context as it stood when the stage started, so
/// it only ever contains stages that precede the reader. In strict mode
/// (the default) reading any other stage is an error; permissive mode
/// returns `None` instead.
#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    context: &'a RunContext,
    stage_name: &'a str,
    strict: bool,
}

impl<'a> StageInputs<'a> {
    /// Creates a strict view for `stage_name`.
    #[must_use]
    pub fn new(context: &'a RunContext, stage_name: &'a str) -> Self {
        Self {
            context,
            stage_name,
            strict: true,
        }
    }

    /// Creates a permissive view.
    #[must_use]
    pub fn permissive(context: &'a RunContext, stage_name: &'a str) -> Self {
        Self {
            context,
            stage_name,
            strict: false,
        }
    }

    /// Gets the result of a preceding stage.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::UndeclaredStage`] in strict mode if `stage`
    /// has no committed result visible to this stage.
    pub fn get(&self, stage: &str) -> Result<Option<&'a StageResult>, ContextError> {
        match self.context.get(stage) {
            Some(result) => Ok(Some(result)),
            None if self.strict => Err(ContextError::UndeclaredStage {
                stage: self.stage_name.to_string(),
                requested: stage.to_string(),
            }),
            None => Ok(None),
        }
    }

    /// Gets a preceding stage's result, failing if it is absent.
    pub fn result(&self, stage: &str) -> Result<&'a StageResult, ContextError> {
        self.get(stage)?.ok_or_else(|| ContextError::UndeclaredStage {
            stage: self.stage_name.to_string(),
            requested: stage.to_string(),
        })
    }

    /// Gets a string field of a preceding stage's result.
    pub fn require_str(&self, stage: &str, key: &str) -> Result<&'a str, ContextError> {
        let result = self.result(stage)?;
        match result.get(key) {
            Some(serde_json::Value::String(s)) => Ok(s),
            Some(_) => Err(ContextError::FieldType {
                stage: stage.to_string(),
                key: key.to_string(),
                expected: "a string".to_string(),
            }),
            None => Err(ContextError::MissingField {
                stage: stage.to_string(),
                key: key.to_string(),
            }),
        }
    }

    /// Deserializes a field of a preceding stage's result.
    pub fn require<T: DeserializeOwned>(&self, stage: &str, key: &str) -> Result<T, PostflowError> {
        let value = self
            .result(stage)?
            .get(key)
            .ok_or_else(|| ContextError::MissingField {
                stage: stage.to_string(),
                key: key.to_string(),
            })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            PostflowError::from(ContextError::FieldType {
                stage: stage.to_string(),
                key: key.to_string(),
                expected: e.to_string(),
            })
        })
    }

    /// Returns true if `stage` has a visible result.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.context.contains(stage)
    }

    /// Returns the visible stage names in order.
    #[must_use]
    pub fn stages(&self) -> Vec<&'a str> {
        self.context.stage_names()
    }

    /// Returns whether strict mode is enabled.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> RunContext {
        let mut ctx = RunContext::new();
        ctx.commit("planner", StageResult::single("outline", "1. Intro")).unwrap();
        ctx.commit("audio", StageResult::single("file_path", "/tmp/a.mp3").with("duration_ms", 800))
            .unwrap();
        ctx
    }

    #[test]
    fn test_strict_get() {
        let ctx = sample_context();
        let inputs = StageInputs::new(&ctx, "writer");

        assert!(inputs.is_strict());
        assert!(inputs.get("planner").unwrap().is_some());

        let err = inputs.get("editor").unwrap_err();
        assert_eq!(
            err,
            ContextError::UndeclaredStage {
                stage: "writer".to_string(),
                requested: "editor".to_string(),
            }
        );
    }

    #[test]
    fn test_permissive_get() {
        let ctx = sample_context();
        let inputs = StageInputs::permissive(&ctx, "writer");
        assert!(inputs.get("editor").unwrap().is_none());
    }

    #[test]
    fn test_require_str() {
        let ctx = sample_context();
        let inputs = StageInputs::new(&ctx, "writer");

        assert_eq!(inputs.require_str("planner", "outline").unwrap(), "1. Intro");
        assert!(matches!(
            inputs.require_str("planner", "draft"),
            Err(ContextError::MissingField { .. })
        ));
        assert!(matches!(
            inputs.require_str("audio", "duration_ms"),
            Err(ContextError::FieldType { .. })
        ));
    }

    #[test]
    fn test_require_typed() {
        let ctx = sample_context();
        let inputs = StageInputs::new(&ctx, "video");

        let duration: u64 = inputs.require("audio", "duration_ms").unwrap();
        assert_eq!(duration, 800);
        assert!(inputs.require::<u64>("audio", "file_path").is_err());
        assert_eq!(inputs.stages(), vec!["planner", "audio"]);
        assert!(inputs.contains("audio"));
    }
}

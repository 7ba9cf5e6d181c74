//! Fixtures for running a single stage outside a pipeline.

use serde_json::{json, Value};

use crate::cancellation::CancellationToken;
use crate::context::{RunContext, RunIdentity, StageContext, TriggerInput};
use crate::contracts::Schema;
use crate::core::StageResult;

/// Owns everything a [`StageContext`] borrows.
#[derive(Debug)]
pub struct StageFixture {
    /// Run identity.
    pub identity: RunIdentity,
    /// Trigger payload.
    pub trigger: TriggerInput,
    /// Results visible to the stage.
    pub context: RunContext,
    /// Cancellation token.
    pub token: CancellationToken,
}

impl Default for StageFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl StageFixture {
    /// Creates a fixture whose trigger is `{"topic": "school pickups"}`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_trigger(&json!({"topic": "school pickups"}))
    }

    /// Creates a fixture with a trigger accepted as-is.
    ///
    /// # Panics
    ///
    /// Panics if `trigger` is not a JSON object.
    #[must_use]
    pub fn with_trigger(trigger: &Value) -> Self {
        let schema = Schema::new("fixture");
        Self {
            identity: RunIdentity::new("fixture"),
            trigger: TriggerInput::validated(&schema, trigger).expect("fixture trigger must be an object"),
            context: RunContext::new(),
            token: CancellationToken::new(),
        }
    }

    /// Creates a fixture whose trigger is validated against `schema`.
    ///
    /// # Panics
    ///
    /// Panics if `trigger` does not satisfy `schema`.
    #[must_use]
    pub fn validated(schema: &Schema, trigger: &Value) -> Self {
        Self {
            trigger: TriggerInput::validated(schema, trigger).expect("fixture trigger must satisfy its schema"),
            ..Self::new()
        }
    }

    /// Commits a preceding result.
    ///
    /// # Panics
    ///
    /// Panics if `stage` was already committed.
    #[must_use]
    pub fn with_result(mut self, stage: &str, result: StageResult) -> Self {
        self.context.commit(stage, result).expect("fixture stage committed twice");
        self
    }

    /// Builds the context for a stage at `index`.
    #[must_use]
    pub fn ctx<'a>(&'a self, stage_name: &'a str, index: usize) -> StageContext<'a> {
        StageContext::new(&self.identity, stage_name, index, &self.trigger, &self.context, &self.token)
    }
}

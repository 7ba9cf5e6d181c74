//! The outcome of one pipeline run.

use crate::context::{RunContext, RunIdentity, TriggerInput};
use crate::core::{RunState, StageResult};
use crate::errors::PostflowError;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Everything a finished run leaves behind.
///
/// `context` holds exactly the results of the stages that completed, in
/// order. `trigger` is `None` only when the payload failed validation.
#[derive(Debug)]
pub struct PipelineRun {
    /// Identity of the run.
    pub identity: RunIdentity,
    /// Terminal state.
    pub state: RunState,
    /// Committed stage results.
    pub context: RunContext,
    /// The validated trigger.
    pub trigger: Option<TriggerInput>,
    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    pub(super) fn new(
        identity: RunIdentity,
        state: RunState,
        context: RunContext,
        trigger: Option<TriggerInput>,
    ) -> Self {
        Self {
            identity,
            state,
            context,
            trigger,
            finished_at: Utc::now(),
        }
    }

    /// Returns true if every stage completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    /// Returns true if the run stopped on an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    /// Returns true if the run was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self.state, RunState::Cancelled { .. })
    }

    /// Returns the failure cause, if any.
    #[must_use]
    pub fn error(&self) -> Option<&PostflowError> {
        self.state.error()
    }

    /// Returns the name of the stage that failed, if one did.
    #[must_use]
    pub fn failed_stage(&self) -> Option<&str> {
        match &self.state {
            RunState::Failed { stage, .. } => stage.as_deref(),
            _ => None,
        }
    }

    /// Returns the result committed by `stage`.
    #[must_use]
    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.context.get(stage)
    }

    /// Returns one value from a stage's result.
    #[must_use]
    pub fn final_value(&self, stage: &str, key: &str) -> Option<&Value> {
        self.context.get(stage).and_then(|r| r.get(key))
    }

    /// Returns the wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.identity.started_at
    }

    /// Converts the run into its context, or the reason it did not complete.
    ///
    /// # Errors
    ///
    /// Returns the stage or validation error for a failed run, and
    /// [`PostflowError::Cancelled`] for a cancelled one.
    pub fn into_result(self) -> Result<RunContext, PostflowError> {
        match self.state {
            RunState::Completed => Ok(self.context),
            RunState::Failed { error, .. } => Err(error),
            RunState::Cancelled { reason, .. } => Err(PostflowError::Cancelled(reason)),
            RunState::Pending | RunState::Running { .. } => Err(PostflowError::stage(
                self.identity.pipeline,
                "run did not reach a terminal state",
            )),
        }
    }

    /// A JSON summary suitable for logs and CLI output.
    #[must_use]
    pub fn summary(&self) -> Value {
        json!({
            "run_id": self.identity.run_id,
            "pipeline": self.identity.pipeline,
            "correlation_id": self.identity.correlation_id,
            "state": self.state.label(),
            "stage_index": self.state.stage_index(),
            "failed_stage": self.failed_stage(),
            "error": self.error().map(ToString::to_string),
            "duration_ms": self.duration().num_milliseconds(),
            "results": self.context.to_value(),
        })
    }
}

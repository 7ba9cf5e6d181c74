//! Run-scoped context.
//!
//! - [`TriggerInput`]: the validated, immutable payload that starts a run
//! - [`RunContext`]: the append-only record of committed stage results
//! - [`StageInputs`]: a stage's read-only view of preceding results
//! - [`StageContext`]: everything a stage receives when it runs

mod identity;
mod inputs;
mod run_context;
mod trigger;

pub use identity::RunIdentity;
pub use inputs::StageInputs;
pub use run_context::{ContextEntry, RunContext};
pub use trigger::TriggerInput;

use crate::cancellation::CancellationToken;

/// The context handed to a running stage.
///
/// Everything is borrowed read-only from the runner: a stage can read the
/// trigger and preceding results but has no way to alter them.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    identity: &'a RunIdentity,
    stage_name: &'a str,
    stage_index: usize,
    trigger: &'a TriggerInput,
    inputs: StageInputs<'a>,
    cancel: &'a CancellationToken,
}

impl<'a> StageContext<'a> {
    /// Creates a stage context.
    #[must_use]
    pub fn new(
        identity: &'a RunIdentity,
        stage_name: &'a str,
        stage_index: usize,
        trigger: &'a TriggerInput,
        context: &'a RunContext,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            identity,
            stage_name,
            stage_index,
            trigger,
            inputs: StageInputs::new(context, stage_name),
            cancel,
        }
    }

    /// Returns the run identity.
    #[must_use]
    pub fn identity(&self) -> &'a RunIdentity {
        self.identity
    }

    /// Returns the name of the running stage.
    #[must_use]
    pub fn stage_name(&self) -> &'a str {
        self.stage_name
    }

    /// Returns the position of the running stage.
    #[must_use]
    pub fn stage_index(&self) -> usize {
        self.stage_index
    }

    /// Returns the trigger payload.
    #[must_use]
    pub fn trigger(&self) -> &'a TriggerInput {
        self.trigger
    }

    /// Returns the preceding stage results.
    #[must_use]
    pub fn inputs(&self) -> StageInputs<'a> {
        self.inputs
    }

    /// Returns true if the caller asked to cancel the run.
    ///
    /// Long-running stages may poll this; the runner itself only checks
    /// between stages.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{FieldSpec, Schema};
    use crate::core::StageResult;
    use serde_json::json;

    #[test]
    fn test_stage_context_accessors() {
        let schema = Schema::new("blog").field(FieldSpec::string("topic").required());
        let trigger = TriggerInput::validated(&schema, &json!({"topic": "safety"})).unwrap();
        let identity = RunIdentity::new("blog");
        let mut results = RunContext::new();
        results.commit("planner", StageResult::single("outline", "o")).unwrap();
        let token = CancellationToken::new();

        let ctx = StageContext::new(&identity, "writer", 1, &trigger, &results, &token);

        assert_eq!(ctx.stage_name(), "writer");
        assert_eq!(ctx.stage_index(), 1);
        assert_eq!(ctx.trigger().get_str("topic"), Some("safety"));
        assert_eq!(ctx.inputs().require_str("planner", "outline").unwrap(), "o");
        assert_eq!(ctx.identity().pipeline, "blog");
        assert!(!ctx.is_cancelled());

        token.cancel("stop");
        assert!(ctx.is_cancelled());
    }
}

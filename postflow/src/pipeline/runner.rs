//! Sequential pipeline execution.

use super::run::PipelineRun;
use crate::cancellation::CancellationToken;
use crate::context::{RunContext, RunIdentity, StageContext, TriggerInput};
use crate::contracts::Schema;
use crate::core::{RunState, StageResult};
use crate::errors::PostflowError;
use crate::events::{EventSink, PipelineEvent};
use crate::stages::Stage;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Token the caller can use to stop the run between stages.
    pub cancel: Option<CancellationToken>,
    /// Caller-supplied correlation ID recorded on the run identity.
    pub correlation_id: Option<String>,
}

impl RunOptions {
    /// Creates default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the correlation ID.
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// A validated, immutable sequence of stages.
///
/// A pipeline can be executed any number of times, concurrently; every run
/// gets its own identity, trigger and context.
#[derive(Clone)]
pub struct Pipeline {
    name: String,
    input_schema: Schema,
    stages: Vec<Arc<dyn Stage>>,
    sink: Arc<dyn EventSink>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("input_schema", &self.input_schema.name)
            .field("stages", &self.stage_names())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub(super) fn new(
        name: String,
        input_schema: Schema,
        stages: Vec<Arc<dyn Stage>>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            name,
            input_schema,
            stages,
            sink,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the trigger schema.
    #[must_use]
    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    /// Returns the stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false: a built pipeline has at least one stage.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Executes the pipeline with default options.
    pub async fn execute(&self, raw: &Value) -> PipelineRun {
        self.execute_with(raw, RunOptions::default()).await
    }

    /// Executes the pipeline.
    ///
    /// The trigger is validated before any stage runs. Stages then run one at
    /// a time in declared order; each result is committed to the run context
    /// before the next stage starts. The first failure ends the run.
    /// Failures are reported through the returned [`PipelineRun`], never as a
    /// panic.
    pub async fn execute_with(&self, raw: &Value, options: RunOptions) -> PipelineRun {
        let mut identity = RunIdentity::new(&self.name);
        if let Some(id) = options.correlation_id {
            identity = identity.with_correlation_id(id);
        }
        let cancel = options.cancel.unwrap_or_default();

        let span = info_span!(
            "pipeline_run",
            pipeline = %self.name,
            run_id = %identity.run_id,
        );
        self.run(identity, raw, cancel).instrument(span).await
    }

    async fn run(&self, identity: RunIdentity, raw: &Value, cancel: CancellationToken) -> PipelineRun {
        let started = Instant::now();
        let mut context = RunContext::new();

        self.emit(
            &identity,
            "pipeline.started",
            json!({
                "stages": self.stage_names(),
                "correlation_id": identity.correlation_id,
            }),
        )
        .await;

        let trigger = match TriggerInput::validated(&self.input_schema, raw) {
            Ok(trigger) => trigger,
            Err(error) => {
                warn!(field = %error.field, reason = %error.reason, "Trigger rejected");
                self.emit(
                    &identity,
                    "pipeline.failed",
                    json!({
                        "stage_index": 0,
                        "error": error.to_string(),
                        "kind": "validation",
                        "field": error.field,
                    }),
                )
                .await;
                let state = RunState::Pending.start().fail(None, error.into());
                return PipelineRun::new(identity, state, context, None);
            }
        };

        info!(stages = self.stages.len(), "Pipeline started");
        let mut state = RunState::Pending.start();

        for (index, stage) in self.stages.iter().enumerate() {
            if index > 0 {
                state = state.advance();
            }

            if cancel.is_cancelled() {
                let reason = cancel.reason().unwrap_or_else(|| "cancelled".to_string());
                info!(stage_index = index, reason = %reason, "Pipeline cancelled");
                self.emit(
                    &identity,
                    "pipeline.cancelled",
                    json!({
                        "stage_index": index,
                        "stage": stage.name(),
                        "reason": reason,
                    }),
                )
                .await;
                let state = state.cancel(reason);
                return PipelineRun::new(identity, state, context, Some(trigger));
            }

            match self
                .run_stage(&identity, stage.as_ref(), index, &trigger, &context, &cancel)
                .await
            {
                Ok(result) => {
                    if let Err(error) = context.commit(stage.name(), result) {
                        let error = PostflowError::from(error);
                        self.report_failure(&identity, stage.name(), index, &error).await;
                        let state = state.fail(Some(stage.name().to_string()), error);
                        return PipelineRun::new(identity, state, context, Some(trigger));
                    }
                }
                Err(error) => {
                    self.report_failure(&identity, stage.name(), index, &error).await;
                    let state = state.fail(Some(stage.name().to_string()), error);
                    return PipelineRun::new(identity, state, context, Some(trigger));
                }
            }
        }

        let duration_ms = elapsed_ms(started);
        info!(duration_ms, "Pipeline completed");
        self.emit(
            &identity,
            "pipeline.completed",
            json!({
                "stages": context.len(),
                "duration_ms": duration_ms,
            }),
        )
        .await;

        PipelineRun::new(identity, state.complete(), context, Some(trigger))
    }

    async fn run_stage(
        &self,
        identity: &RunIdentity,
        stage: &dyn Stage,
        index: usize,
        trigger: &TriggerInput,
        context: &RunContext,
        cancel: &CancellationToken,
    ) -> Result<StageResult, PostflowError> {
        let name = stage.name();
        let kind = stage.kind();

        self.emit(
            identity,
            "stage.started",
            json!({
                "stage": name,
                "stage_index": index,
                "kind": kind,
            }),
        )
        .await;

        let started = Instant::now();
        let ctx = StageContext::new(identity, name, index, trigger, context, cancel);
        let outcome = stage
            .run(&ctx)
            .instrument(info_span!("stage", stage = %name, stage_index = index, kind = %kind))
            .await;
        let duration_ms = elapsed_ms(started);

        if let Ok(result) = &outcome {
            debug!(stage = %name, duration_ms, keys = result.len(), "Stage completed");
            self.emit(
                identity,
                "stage.completed",
                json!({
                    "stage": name,
                    "stage_index": index,
                    "duration_ms": duration_ms,
                    "keys": result.keys().collect::<Vec<_>>(),
                }),
            )
            .await;
        }

        outcome
    }

    async fn report_failure(&self, identity: &RunIdentity, stage: &str, index: usize, error: &PostflowError) {
        warn!(stage = %stage, stage_index = index, error = %error, "Stage failed");
        let data = json!({
            "stage": stage,
            "stage_index": index,
            "error": error.to_string(),
            "kind": error.kind(),
        });
        self.emit(identity, "stage.failed", data.clone()).await;
        self.emit(identity, "pipeline.failed", data).await;
    }

    async fn emit(&self, identity: &RunIdentity, event_type: &str, data: Value) {
        let event = PipelineEvent::new(event_type, identity.run_id, &self.name, data);
        self.sink.emit(&event).await;
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::FieldSpec;
    use crate::events::CollectingEventSink;
    use crate::pipeline::PipelineBuilder;
    use crate::testing::{FailingStage, SuccessStage};

    fn schema() -> Schema {
        Schema::new("t").field(FieldSpec::string("topic").required())
    }

    #[tokio::test]
    async fn test_events_for_successful_run() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("events")
            .input_schema(schema())
            .stage(Arc::new(SuccessStage::new("a")))
            .stage(Arc::new(SuccessStage::new("b")))
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        let run = pipeline.execute(&json!({"topic": "x"})).await;
        assert!(run.is_completed());

        assert_eq!(
            sink.event_types(),
            vec![
                "pipeline.started",
                "stage.started",
                "stage.completed",
                "stage.started",
                "stage.completed",
                "pipeline.completed",
            ]
        );
        assert!(sink.events().iter().all(|e| e.run_id == run.identity.run_id));
    }

    #[tokio::test]
    async fn test_events_for_failed_stage() {
        let sink = Arc::new(CollectingEventSink::new());
        let pipeline = PipelineBuilder::new("events")
            .stage(Arc::new(FailingStage::new("bad", "boom")))
            .with_event_sink(sink.clone())
            .build()
            .unwrap();

        let run = pipeline.execute(&json!({})).await;
        assert!(run.is_failed());

        let failed = sink.events_of_type("stage.failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].stage(), Some("bad"));
        assert_eq!(failed[0].data["kind"], "stage");
        assert_eq!(sink.events_of_type("pipeline.failed").len(), 1);
    }

    #[tokio::test]
    async fn test_correlation_id_recorded() {
        let pipeline = PipelineBuilder::new("ids")
            .stage(Arc::new(SuccessStage::new("a")))
            .build()
            .unwrap();

        let run = pipeline
            .execute_with(&json!({}), RunOptions::new().with_correlation_id("job-7"))
            .await;
        assert_eq!(run.identity.correlation_id.as_deref(), Some("job-7"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_isolated() {
        let pipeline = Arc::new(
            PipelineBuilder::new("concurrent")
                .input_schema(schema())
                .stage(Arc::new(SuccessStage::new("a")))
                .build()
                .unwrap(),
        );

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let pipeline = pipeline.clone();
                tokio::spawn(async move { pipeline.execute(&json!({"topic": format!("t{i}")})).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            let run = handle.await.unwrap();
            assert!(run.is_completed());
            assert_eq!(run.context.len(), 1);
            ids.push(run.identity.run_id);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}

//! Stub stages for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use crate::cancellation::CancellationToken;
use crate::context::StageContext;
use crate::core::StageResult;
use crate::errors::PostflowError;
use crate::stages::Stage;

/// A stage that always succeeds with optional data.
#[derive(Debug)]
pub struct SuccessStage {
    name: String,
    result: StageResult,
}

impl SuccessStage {
    /// Creates a stage that returns `{"stage": <name>}`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            result: StageResult::single("stage", name.clone()),
            name,
        }
    }

    /// Creates a stage that returns `result`.
    #[must_use]
    pub fn with_result(name: impl Into<String>, result: StageResult) -> Self {
        Self {
            name: name.into(),
            result,
        }
    }
}

#[async_trait]
impl Stage for SuccessStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        Ok(self.result.clone())
    }
}

/// A stage that always fails.
#[derive(Debug)]
pub struct FailingStage {
    name: String,
    error: String,
}

impl FailingStage {
    /// Creates a new failing stage.
    #[must_use]
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            error: error.into(),
        }
    }
}

#[async_trait]
impl Stage for FailingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        Err(PostflowError::stage(&self.name, &self.error))
    }
}

/// A stage that takes time to execute.
#[derive(Debug)]
pub struct SlowStage {
    name: String,
    delay: Duration,
}

impl SlowStage {
    /// Creates a slow stage with delay in milliseconds.
    #[must_use]
    pub fn with_delay_ms(name: impl Into<String>, ms: u64) -> Self {
        Self {
            name: name.into(),
            delay: Duration::from_millis(ms),
        }
    }
}

#[async_trait]
impl Stage for SlowStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        tokio::time::sleep(self.delay).await;
        Ok(StageResult::single("slept_ms", u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX)))
    }
}

/// What a [`RecordingStage`] saw when it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExecution {
    /// Stage name from the context.
    pub stage_name: String,
    /// Position from the context.
    pub stage_index: usize,
    /// Stages whose results were visible.
    pub visible_stages: Vec<String>,
}

/// A stage that records every execution, optionally into a log shared with
/// other stages so tests can check visiting order.
#[derive(Debug)]
pub struct RecordingStage {
    name: String,
    executions: Mutex<Vec<RecordedExecution>>,
    shared_log: Option<Arc<Mutex<Vec<String>>>>,
}

impl RecordingStage {
    /// Creates a new recording stage.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executions: Mutex::new(Vec::new()),
            shared_log: None,
        }
    }

    /// Creates a recording stage that also appends its name to `log`.
    #[must_use]
    pub fn with_log(name: impl Into<String>, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            shared_log: Some(log),
            ..Self::new(name)
        }
    }

    /// Returns all recorded executions.
    #[must_use]
    pub fn executions(&self) -> Vec<RecordedExecution> {
        self.executions.lock().clone()
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.executions.lock().len()
    }
}

#[async_trait]
impl Stage for RecordingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        let visible_stages: Vec<String> = ctx.inputs().stages().into_iter().map(String::from).collect();
        self.executions.lock().push(RecordedExecution {
            stage_name: ctx.stage_name().to_string(),
            stage_index: ctx.stage_index(),
            visible_stages,
        });
        if let Some(log) = &self.shared_log {
            log.lock().push(self.name.clone());
        }
        Ok(StageResult::single("visited", self.name.clone()).with("index", ctx.stage_index()))
    }
}

/// A stage that cancels a token while it runs, then succeeds.
#[derive(Debug)]
pub struct CancellingStage {
    name: String,
    token: CancellationToken,
    reason: String,
}

impl CancellingStage {
    /// Creates a stage that cancels `token` with `reason`.
    #[must_use]
    pub fn new(name: impl Into<String>, token: CancellationToken, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Stage for CancellingStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        self.token.cancel(&self.reason);
        Ok(StageResult::single("cancel_seen", ctx.is_cancelled()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StageFixture;

    #[tokio::test]
    async fn test_success_stage() {
        let fixture = StageFixture::new();
        let result = SuccessStage::new("ok").run(&fixture.ctx("ok", 0)).await.unwrap();
        assert_eq!(result.get_str("stage"), Some("ok"));
    }

    #[tokio::test]
    async fn test_failing_stage() {
        let fixture = StageFixture::new();
        let err = FailingStage::new("bad", "boom")
            .run(&fixture.ctx("bad", 0))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Stage 'bad' failed: boom");
    }

    #[tokio::test]
    async fn test_slow_stage() {
        let fixture = StageFixture::new();
        let start = std::time::Instant::now();
        SlowStage::with_delay_ms("slow", 10)
            .run(&fixture.ctx("slow", 0))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_recording_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let stage = RecordingStage::with_log("record", log.clone());
        let fixture = StageFixture::new().with_result("earlier", StageResult::single("k", 1));

        stage.run(&fixture.ctx("record", 1)).await.unwrap();

        assert_eq!(stage.execution_count(), 1);
        let execution = &stage.executions()[0];
        assert_eq!(execution.stage_index, 1);
        assert_eq!(execution.visible_stages, vec!["earlier".to_string()]);
        assert_eq!(*log.lock(), vec!["record".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelling_stage() {
        let fixture = StageFixture::new();
        let stage = CancellingStage::new("stop", fixture.token.clone(), "user");
        let result = stage.run(&fixture.ctx("stop", 0)).await.unwrap();
        assert_eq!(result.get("cancel_seen"), Some(&serde_json::json!(true)));
        assert_eq!(fixture.token.reason().as_deref(), Some("user"));
    }
}

//! Stage trait and implementations.
//!
//! Stages are the units of work in a postflow pipeline. A stage reads the
//! trigger and the results of the stages before it and returns one
//! [`StageResult`]. Any error it returns is fatal to the run.

mod agent;

pub use agent::{AgentOutput, AgentStage};

use crate::context::StageContext;
use crate::core::{StageKind, StageResult};
use crate::errors::PostflowError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt::Debug;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Returns how the stage does its work, for logs and events.
    fn kind(&self) -> StageKind {
        StageKind::Direct
    }

    /// Executes the stage.
    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError>;
}

/// A synchronous function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext<'_>) -> Result<StageResult, PostflowError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext<'_>) -> Result<StageResult, PostflowError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext<'_>) -> Result<StageResult, PostflowError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext<'_>) -> Result<StageResult, PostflowError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        (self.func)(ctx)
    }
}

/// An async function-based stage.
///
/// ```
/// use futures::FutureExt;
/// use postflow::core::StageResult;
/// use postflow::errors::PostflowError;
/// use postflow::stages::AsyncFnStage;
///
/// let stage = AsyncFnStage::new("fetch", |ctx| {
///     async move {
///         let topic = ctx.trigger().require_str("topic")?.to_string();
///         Ok::<_, PostflowError>(StageResult::single("topic", topic))
///     }
///     .boxed()
/// });
/// # let _ = stage;
/// ```
pub struct AsyncFnStage<F>
where
    F: for<'c> Fn(StageContext<'c>) -> BoxFuture<'c, Result<StageResult, PostflowError>> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> AsyncFnStage<F>
where
    F: for<'c> Fn(StageContext<'c>) -> BoxFuture<'c, Result<StageResult, PostflowError>> + Send + Sync,
{
    /// Creates a new async function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for AsyncFnStage<F>
where
    F: for<'c> Fn(StageContext<'c>) -> BoxFuture<'c, Result<StageResult, PostflowError>> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncFnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for AsyncFnStage<F>
where
    F: for<'c> Fn(StageContext<'c>) -> BoxFuture<'c, Result<StageResult, PostflowError>> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &StageContext<'_>) -> Result<StageResult, PostflowError> {
        (self.func)(*ctx).await
    }
}

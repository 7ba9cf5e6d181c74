//! Testing utilities for postflow pipelines.
//!
//! This module provides:
//! - Stub stages (succeeding, failing, slow, recording, cancelling)
//! - A scripted language model
//! - In-memory fakes for every adapter category
//! - A fixture for running one stage outside a pipeline

mod adapters;
mod fixtures;
mod model;
mod stages;

pub use adapters::{FakeAudio, FakeImage, FakeSearch, FakeVideo, InMemoryPublisher, StaticFetcher};
pub use fixtures::StageFixture;
pub use model::ScriptedModel;
pub use stages::{CancellingStage, FailingStage, RecordedExecution, RecordingStage, SlowStage, SuccessStage};

//! # Postflow
//!
//! Checkpointed content pipelines for a children's escort service: blog
//! posts planned, written and edited by agents, then stored and published,
//! plus image, narration and short-video production.
//!
//! - **Ordered stages**: a pipeline runs its stages strictly in order over
//!   one run-scoped context; each stage sees every earlier result
//! - **Validated triggers**: every run starts from a schema-checked payload
//! - **Agents**: a persona bound to a model and an allow-list of adapters
//!   it may call as tools
//! - **Adapters**: search, page fetch, media generation, CMS publishing and
//!   a content datastore behind traits, with in-memory fakes in [`testing`]
//!
//! ## Quick Start
//!
//! ```
//! use postflow::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = PipelineBuilder::new("greeting")
//!     .input_schema(Schema::new("trigger").field(FieldSpec::string("name").required()))
//!     .stage(Arc::new(FnStage::new("greet", |ctx: &StageContext<'_>| {
//!         let name = ctx.trigger().require_str("name")?;
//!         Ok(StageResult::single("greeting", format!("Hello, {name}")))
//!     })))
//!     .build()?;
//!
//! let run = pipeline.execute(&json!({"name": "Aiko"})).await;
//! assert!(run.is_completed());
//! assert_eq!(run.final_value("greet", "greeting"), Some(&json!("Hello, Aiko")));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod agents;
pub mod cancellation;
pub mod config;
pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod workflows;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapters::{
        AudioGenerator, ContentStore, FetchAdapter, ImageProcessor, PublishAdapter, SearchAdapter,
        VideoComposer,
    };
    pub use crate::agents::{Agent, Capabilities, LanguageModel, ModelRef};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::Settings;
    pub use crate::context::{RunContext, RunIdentity, StageContext, StageInputs, TriggerInput};
    pub use crate::contracts::{FieldSpec, FieldType, IntoStageResult, Schema};
    pub use crate::core::{RunState, StageKind, StageResult};
    pub use crate::errors::{
        AdapterError, AgentInvocationError, ContextError, PipelineDefinitionError, PostflowError,
        ValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::pipeline::{Pipeline, PipelineBuilder, PipelineRun, RunOptions};
    pub use crate::stages::{AgentStage, AsyncFnStage, FnStage, Stage};
}

//! Pipeline builder with validation.

use super::runner::Pipeline;
use crate::contracts::Schema;
use crate::errors::PipelineDefinitionError;
use crate::events::{EventSink, NoOpEventSink};
use crate::stages::Stage;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Builder for creating validated pipelines.
#[derive(Clone)]
pub struct PipelineBuilder {
    name: String,
    input_schema: Option<Schema>,
    stages: Vec<Arc<dyn Stage>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input_schema: None,
            stages: Vec::new(),
            sink: None,
        }
    }

    /// Declares the trigger schema. Without one, any JSON object is accepted.
    #[must_use]
    pub fn input_schema(mut self, schema: Schema) -> Self {
        self.input_schema = Some(schema);
        self
    }

    /// Appends a stage. Stages run in the order they are added.
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validates the definition and builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineDefinitionError`] if there are no stages, a stage
    /// name is blank, or two stages share a name.
    pub fn build(self) -> Result<Pipeline, PipelineDefinitionError> {
        if self.stages.is_empty() {
            return Err(PipelineDefinitionError::empty(&self.name));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            let name = stage.name();
            if name.trim().is_empty() {
                return Err(PipelineDefinitionError::blank_stage_name(&self.name));
            }
            if !seen.insert(name) {
                return Err(PipelineDefinitionError::duplicate_stage(&self.name, name));
            }
        }

        let schema = self
            .input_schema
            .unwrap_or_else(|| Schema::new(self.name.clone()));
        let sink = self.sink.unwrap_or_else(|| Arc::new(NoOpEventSink));

        Ok(Pipeline::new(self.name, schema, self.stages, sink))
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("stages", &self.stages)
            .field("has_event_sink", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

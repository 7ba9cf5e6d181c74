//! The append-only record of committed stage results for one run.

use crate::core::StageResult;
use crate::errors::ContextError;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One committed stage result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextEntry {
    /// The stage that produced the result.
    pub stage: String,
    /// The result itself.
    pub result: StageResult,
    /// When the result was committed.
    pub committed_at: DateTime<Utc>,
}

/// Ordered mapping from stage name to its committed result.
///
/// Entries can only be appended; an existing entry is never replaced or
/// removed. The runner owns the context for the duration of a run and hands
/// stages a read-only view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunContext {
    entries: Vec<ContextEntry>,
}

impl RunContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a result under `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::DuplicateStage`] if a result for `stage` has
    /// already been committed.
    pub fn commit(&mut self, stage: impl Into<String>, result: StageResult) -> Result<(), ContextError> {
        let stage = stage.into();
        if self.contains(&stage) {
            return Err(ContextError::DuplicateStage { stage });
        }
        self.entries.push(ContextEntry {
            stage,
            result,
            committed_at: Utc::now(),
        });
        Ok(())
    }

    /// Gets the result committed under `stage`.
    #[must_use]
    pub fn get(&self, stage: &str) -> Option<&StageResult> {
        self.entries.iter().find(|e| e.stage == stage).map(|e| &e.result)
    }

    /// Returns true if `stage` has a committed result.
    #[must_use]
    pub fn contains(&self, stage: &str) -> bool {
        self.entries.iter().any(|e| e.stage == stage)
    }

    /// Returns the stage names in commit order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.stage.as_str()).collect()
    }

    /// Returns the committed entries in order.
    #[must_use]
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Returns the most recently committed result.
    #[must_use]
    pub fn last(&self) -> Option<&StageResult> {
        self.entries.last().map(|e| &e.result)
    }

    /// Returns the number of committed results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Renders the context as `{stage: fields}`.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|e| (e.stage.clone(), e.result.to_value()))
            .collect();
        serde_json::Value::Object(map)
    }
}

//! Pipeline events and the sinks that receive them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Level};
use uuid::Uuid;

/// A lifecycle event emitted by the runner.
///
/// Event types: `pipeline.started`, `stage.started`, `stage.completed`,
/// `stage.failed`, `pipeline.completed`, `pipeline.failed`,
/// `pipeline.cancelled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type.
    pub event_type: String,
    /// The run the event belongs to.
    pub run_id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Event-specific payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
}

impl PipelineEvent {
    /// Creates a new event stamped with the current time.
    #[must_use]
    pub fn new(
        event_type: impl Into<String>,
        run_id: Uuid,
        pipeline: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            run_id,
            pipeline: pipeline.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Returns the `stage` field of the payload, if present.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.data.get("stage").and_then(serde_json::Value::as_str)
    }
}

/// Trait for event sinks.
///
/// Sinks must not fail the run: any delivery problem is theirs to log.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers an event.
    async fn emit(&self, event: &PipelineEvent);
}

/// A no-op event sink that discards all events.
///
/// Used as the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: &PipelineEvent) {}
}

/// An event sink that logs events using the tracing framework.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a new logging event sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        // Failures are always surfaced at warn, whatever the configured level.
        if event.event_type.ends_with(".failed") {
            warn!(
                event_type = %event.event_type,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                event_data = %event.data,
                "Event: {}", event.event_type
            );
            return;
        }

        if self.level == Level::DEBUG {
            debug!(
                event_type = %event.event_type,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                event_data = %event.data,
                "Event: {}", event.event_type
            );
        } else {
            info!(
                event_type = %event.event_type,
                run_id = %event.run_id,
                pipeline = %event.pipeline,
                event_data = %event.data,
                "Event: {}", event.event_type
            );
        }
    }
}

/// A collecting event sink for tests and run reports.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: parking_lot::RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event types in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|e| e.event_type.clone()).collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Returns events matching a type prefix.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str) -> PipelineEvent {
        PipelineEvent::new(event_type, Uuid::new_v4(), "blog", json!({"stage": "planner"}))
    }

    #[tokio::test]
    async fn test_noop_sink() {
        NoOpEventSink.emit(&event("stage.started")).await;
    }

    #[tokio::test]
    async fn test_logging_sink() {
        let sink = LoggingEventSink::default();
        sink.emit(&event("stage.completed")).await;
        sink.emit(&event("stage.failed")).await;
        LoggingEventSink::debug().emit(&event("pipeline.started")).await;
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&event("stage.started")).await;
        sink.emit(&event("stage.completed")).await;
        sink.emit(&event("pipeline.completed")).await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("stage.").len(), 2);
        assert_eq!(sink.event_types()[2], "pipeline.completed");
        assert_eq!(sink.events()[0].stage(), Some("planner"));
    }
}

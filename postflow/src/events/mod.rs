//! Lifecycle events emitted while a pipeline runs.
//!
//! Sinks are handed to the runner explicitly; there is no global sink.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};

//! Observability utilities: subscriber setup and per-run wide events.

use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

use crate::config::LogSettings;
use crate::errors::ConfigError;
use crate::pipeline::PipelineRun;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `settings.level` when set. Returns `false` when a
/// global subscriber was already installed, which is not an error.
pub fn init_tracing(settings: &LogSettings) -> Result<bool, ConfigError> {
    let filter = filter_for(std::env::var("RUST_LOG").ok(), settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if settings.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}

fn filter_for(rust_log: Option<String>, settings: &LogSettings) -> Result<EnvFilter, ConfigError> {
    let (key, directive) = match rust_log.filter(|v| !v.trim().is_empty()) {
        Some(env) => ("RUST_LOG", env),
        None => ("logging.level", settings.level.clone()),
    };
    EnvFilter::try_new(&directive).map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Builds one wide event describing a finished run.
///
/// Per-stage details carry the result keys and the `degraded` flag so a
/// partial publish stands out in log search.
#[must_use]
pub fn run_event_payload(run: &PipelineRun) -> Value {
    let stages: Vec<Value> = run
        .context
        .entries()
        .iter()
        .map(|entry| {
            let mut keys: Vec<&String> = entry.result.keys().collect();
            keys.sort();
            json!({
                "stage": entry.stage,
                "data_keys": keys,
                "degraded": entry.result.metadata("degraded").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect();

    json!({
        "pipeline": run.identity.pipeline,
        "run_id": run.identity.run_id.to_string(),
        "correlation_id": run.identity.correlation_id,
        "status": run.state.label(),
        "failed_stage": run.failed_stage(),
        "error": run.error().map(ToString::to_string),
        "duration_ms": run.duration().num_milliseconds(),
        "stages_completed": stages.len(),
        "stage_details": stages,
    })
}

/// Logs the wide event for a finished run: `info` on success, `warn`
/// otherwise.
pub fn emit_run_event(run: &PipelineRun) {
    let payload = run_event_payload(run);
    if run.is_completed() {
        tracing::info!(pipeline = %run.identity.pipeline, run_id = %run.identity.run_id, event = %payload, "pipeline.wide");
    } else {
        tracing::warn!(pipeline = %run.identity.pipeline, run_id = %run.identity.run_id, event = %payload, "pipeline.wide");
    }
}

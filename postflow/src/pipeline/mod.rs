//! Pipeline building and execution.
//!
//! This module provides:
//! - Pipeline builder with validation
//! - The sequential runner and its per-run options
//! - The report of a finished run

mod builder;
mod run;
mod runner;

#[cfg(test)]
mod integration_tests;

pub use builder::PipelineBuilder;
pub use run::PipelineRun;
pub use runner::{Pipeline, RunOptions};

//! Core domain model types for postflow.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage kinds and the run state machine
//! - Immutable stage result records

mod result;
mod status;

pub use result::StageResult;
pub use status::{RunState, StageKind};

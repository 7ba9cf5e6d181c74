//! Stage kinds and the run state machine.

use crate::errors::PostflowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a stage produces its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// The stage calls adapters itself and assembles a deterministic result.
    #[default]
    Direct,
    /// The stage delegates to a bound agent and uses its response.
    Agent,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// State of one pipeline run.
///
/// ```text
/// Pending -> Running(0) -> Running(1) -> ... -> Completed
///                 \-> Failed(i, error)
///                 \-> Cancelled(i)
/// ```
#[derive(Debug, Default)]
pub enum RunState {
    /// The run has not started.
    #[default]
    Pending,
    /// The stage at `stage_index` is executing.
    Running {
        /// Index of the executing stage.
        stage_index: usize,
    },
    /// Every stage completed.
    Completed,
    /// The run stopped on an error.
    Failed {
        /// Index of the stage that failed (0 for trigger validation).
        stage_index: usize,
        /// Name of the failing stage; `None` when validation failed before
        /// any stage ran.
        stage: Option<String>,
        /// The cause.
        error: PostflowError,
    },
    /// The run was cancelled before the stage at `stage_index` started.
    Cancelled {
        /// Index of the first stage that did not run.
        stage_index: usize,
        /// Cancellation reason.
        reason: String,
    },
}

impl RunState {
    /// Moves `Pending` to `Running(0)`.
    #[must_use]
    pub fn start(self) -> Self {
        match self {
            Self::Pending => Self::Running { stage_index: 0 },
            other => other,
        }
    }

    /// Moves `Running(i)` to `Running(i + 1)`.
    #[must_use]
    pub fn advance(self) -> Self {
        match self {
            Self::Running { stage_index } => Self::Running {
                stage_index: stage_index + 1,
            },
            other => other,
        }
    }

    /// Moves `Running(_)` to `Completed`.
    #[must_use]
    pub fn complete(self) -> Self {
        match self {
            Self::Running { .. } => Self::Completed,
            other => other,
        }
    }

    /// Moves `Running(i)` to `Failed(i, error)`.
    #[must_use]
    pub fn fail(self, stage: Option<String>, error: PostflowError) -> Self {
        match self {
            Self::Running { stage_index } => Self::Failed {
                stage_index,
                stage,
                error,
            },
            other => other,
        }
    }

    /// Moves `Running(i)` to `Cancelled(i)`.
    #[must_use]
    pub fn cancel(self, reason: impl Into<String>) -> Self {
        match self {
            Self::Running { stage_index } => Self::Cancelled {
                stage_index,
                reason: reason.into(),
            },
            other => other,
        }
    }

    /// Returns the current stage index, if any.
    #[must_use]
    pub fn stage_index(&self) -> Option<usize> {
        match self {
            Self::Running { stage_index }
            | Self::Failed { stage_index, .. }
            | Self::Cancelled { stage_index, .. } => Some(*stage_index),
            Self::Pending | Self::Completed => None,
        }
    }

    /// Returns true for `Completed`, `Failed` and `Cancelled`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::Cancelled { .. })
    }

    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns true if the run failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Returns the failure cause, if any.
    #[must_use]
    pub fn error(&self) -> Option<&PostflowError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns a short label for logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running { .. } => "running",
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending | Self::Completed => write!(f, "{}", self.label()),
            Self::Running { stage_index } => write!(f, "running({stage_index})"),
            Self::Failed {
                stage_index, error, ..
            } => write!(f, "failed({stage_index}): {error}"),
            Self::Cancelled { stage_index, reason } => {
                write!(f, "cancelled({stage_index}): {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_kind_display() {
        assert_eq!(StageKind::Direct.to_string(), "direct");
        assert_eq!(StageKind::Agent.to_string(), "agent");
        assert_eq!(StageKind::default(), StageKind::Direct);
    }

    #[test]
    fn test_happy_path_transitions() {
        let state = RunState::Pending.start();
        assert_eq!(state.stage_index(), Some(0));

        let state = state.advance().advance();
        assert_eq!(state.stage_index(), Some(2));
        assert!(!state.is_terminal());

        let state = state.complete();
        assert!(state.is_completed());
        assert!(state.is_terminal());
        assert_eq!(state.stage_index(), None);
    }

    #[test]
    fn test_fail_keeps_index() {
        let state = RunState::Pending
            .start()
            .advance()
            .fail(Some("writer".to_string()), PostflowError::stage("writer", "boom"));

        match state {
            RunState::Failed {
                stage_index, stage, ..
            } => {
                assert_eq!(stage_index, 1);
                assert_eq!(stage.as_deref(), Some("writer"));
            }
            other => panic!("unexpected state {other}"),
        }
    }

    #[test]
    fn test_terminal_states_absorb() {
        let state = RunState::Pending.start().complete();
        let state = state.advance().fail(None, PostflowError::Cancelled("x".into()));
        assert!(state.is_completed());
    }

    #[test]
    fn test_cancel() {
        let state = RunState::Pending.start().advance().cancel("user");
        assert_eq!(state.label(), "cancelled");
        assert_eq!(state.stage_index(), Some(1));
        assert!(state.to_string().contains("user"));
    }
}

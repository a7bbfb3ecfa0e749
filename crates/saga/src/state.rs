//! Saga state machine.

use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// The state of a cart saga in its lifecycle.
///
/// State transitions:
/// ```text
/// NotStarted ──► Running ──┬──► Completed
///                          └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaState {
    #[default]
    NotStarted,

    /// Forward steps are being executed.
    Running,

    /// A step failed and completed steps are being undone.
    Compensating,

    /// Every step succeeded (terminal).
    Completed,

    /// Compensation finished after a failure (terminal).
    Failed,
}

impl SagaState {
    /// Returns true if `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: SagaState) -> bool {
        matches!(
            (self, next),
            (SagaState::NotStarted, SagaState::Running)
                | (SagaState::Running, SagaState::Completed)
                | (SagaState::Running, SagaState::Compensating)
                | (SagaState::Compensating, SagaState::Failed)
        )
    }

    /// Moves to `next`, refusing any edge the machine does not have.
    pub fn transition(self, next: SagaState) -> Result<SagaState, SagaError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(SagaError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::Completed | SagaState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::NotStarted => "not_started",
            SagaState::Running => "running",
            SagaState::Compensating => "compensating",
            SagaState::Completed => "completed",
            SagaState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

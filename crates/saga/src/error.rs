//! Saga error types.

use common::SagaId;
use domain::DomainError;
use thiserror::Error;

use crate::state::SagaState;

/// Errors that can occur during saga operations.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The saga tried to take an edge its state machine does not have.
    #[error("Invalid saga transition from {from} to {to}")]
    InvalidTransition { from: SagaState, to: SagaState },

    /// A forward step failed; every completed step was compensated.
    #[error("Saga step '{step}' failed: {source}")]
    StepFailed {
        saga_id: SagaId,
        step: &'static str,
        source: DomainError,
    },

    /// Undoing a completed step failed. Stock may be off by the step's
    /// quantity and needs manual reconciliation.
    #[error("Compensation step '{step}' failed: {reason}")]
    CompensationFailed {
        saga_id: SagaId,
        step: &'static str,
        reason: String,
    },

    /// A precondition checked before the saga started did not hold.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl SagaError {
    /// The domain failure behind this error, if there is one a caller can act
    /// on.
    pub fn domain_error(&self) -> Option<&DomainError> {
        match self {
            SagaError::StepFailed { source, .. } | SagaError::Domain(source) => Some(source),
            SagaError::InvalidTransition { .. } | SagaError::CompensationFailed { .. } => None,
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;

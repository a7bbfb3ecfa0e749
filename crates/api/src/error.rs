//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use saga::SagaError;
use serde_json::{Value, json};
use store::StoreError;
use thiserror::Error;

use crate::response::ApiResponse;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request: unparsable body, wrong field type, unknown action.
    #[error("{0}")]
    BadRequest(String),

    /// The endpoint needs a signed-in user and none was supplied.
    #[error("authentication required")]
    Unauthorized,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Saga(#[from] SagaError),
}

impl ApiError {
    /// A field that could not be read as the expected type.
    pub fn invalid(field: &str, message: impl std::fmt::Display) -> Self {
        ApiError::BadRequest(format!("invalid {field}: {message}"))
    }

    /// A required field that was absent or null.
    pub fn missing(field: &str) -> Self {
        ApiError::BadRequest(format!("missing {field}"))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Saga(err) => match err.domain_error() {
                Some(source) => domain_status(source),
                None => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn details(&self) -> Option<Value> {
        let err = match self {
            ApiError::Domain(err) => err,
            ApiError::Saga(err) => err.domain_error()?,
            _ => return None,
        };
        match err {
            DomainError::NotConfirmable { ids } => Some(json!({ "ids": ids })),
            _ => None,
        }
    }

    fn client_message(&self) -> String {
        match self {
            // The failed step is internal detail; the client sees the cause.
            ApiError::Saga(SagaError::StepFailed { source, .. }) => source.to_string(),
            ApiError::Saga(SagaError::Domain(source)) => source.to_string(),
            other => other.to_string(),
        }
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Validation { .. }
        | DomainError::NoFieldsToUpdate
        | DomainError::ForeignKeyViolation { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } | DomainError::NotFoundOrAlreadyResolved(_) => {
            StatusCode::NOT_FOUND
        }
        DomainError::InvalidTransition { .. }
        | DomainError::InsufficientStock { .. }
        | DomainError::NotConfirmable { .. }
        | DomainError::NoLongerPending(_)
        | DomainError::Unavailable { .. } => StatusCode::CONFLICT,
        DomainError::Store(StoreError::Connection(_)) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %self, "internal server error");
                "internal server error".to_string()
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(error = %self, "store unavailable");
                "service unavailable".to_string()
            }
            _ => self.client_message(),
        };

        let body = match self.details() {
            Some(details) => ApiResponse::error_with_data(message, details),
            None => ApiResponse::error(message),
        };
        (status, body).into_response()
    }
}

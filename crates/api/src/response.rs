//! Response envelope shared by every endpoint.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Uniform response body.
///
/// ```json
/// { "ok": true, "data": { ... } }
/// { "ok": false, "error": "invalid quantity: must be greater than zero" }
/// ```
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// An error that carries details, such as the offending ids.
    pub fn error_with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            ok: false,
            data: Some(data),
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `{ "id": ... }` payload returned by deletes.
#[derive(Debug, Serialize)]
pub struct Deleted<I> {
    pub id: I,
}

//! Supplier request CRUD and the reconciliation endpoint.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, SupplierRequestId};
use domain::CreateSupplierRequest;
use store::{Resolution, ResolvedRequest, Store, SupplierRequest, SupplierRequestPatch};

use crate::error::ApiError;
use crate::input::{JsonBody, path_id};
use crate::response::{ApiResponse, Deleted};
use crate::state::AppState;

fn parse_resolution(raw: &str) -> Result<Resolution, ApiError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "aceptar" | "accept" => Ok(Resolution::Accept),
        "rechazar" | "reject" => Ok(Resolution::Reject),
        other => Err(ApiError::invalid(
            "action",
            format!("expected 'aceptar' or 'rechazar', got '{other}'"),
        )),
    }
}

/// GET /supplier-requests
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<ApiResponse<Vec<SupplierRequest>>, ApiError> {
    Ok(ApiResponse::ok(state.supplier_requests.list_all().await?))
}

/// POST /supplier-requests
#[tracing::instrument(skip(state, body))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, ApiResponse<SupplierRequest>), ApiError> {
    let cmd = CreateSupplierRequest {
        product_id: ProductId::new(body.require_integer("product_id")?),
        quantity: body.require_integer("quantity")?,
        description: body.text("description")?,
    };
    let request = state.supplier_requests.create(cmd).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(request)))
}

/// GET /supplier-requests/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<SupplierRequest>, ApiError> {
    let id = SupplierRequestId::new(path_id(&id)?);
    Ok(ApiResponse::ok(state.supplier_requests.get(id).await?))
}

/// PUT /supplier-requests/{id}
///
/// Only pending requests can be edited, and never their state: resolution
/// goes through `/supplier-requests/resolve` so stock is applied with it.
#[tracing::instrument(skip(state, body))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<SupplierRequest>, ApiError> {
    let id = SupplierRequestId::new(path_id(&id)?);
    if body.contains("state") {
        return Err(ApiError::invalid(
            "state",
            "use /supplier-requests/resolve to accept or reject a request",
        ));
    }
    let patch = SupplierRequestPatch {
        product_id: body.integer("product_id")?.map(ProductId::new),
        quantity: body.integer("quantity")?,
        description: body.nullable_text("description")?,
    };
    Ok(ApiResponse::ok(
        state.supplier_requests.update(id, patch).await?,
    ))
}

/// DELETE /supplier-requests/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Deleted<SupplierRequestId>>, ApiError> {
    let id = SupplierRequestId::new(path_id(&id)?);
    let id = state.supplier_requests.delete(id).await?;
    Ok(ApiResponse::ok(Deleted { id }))
}

/// POST /supplier-requests/resolve
///
/// Accepting adds the requested quantity to stock. Either outcome clears the
/// product's pending-restock flag, and a request resolves at most once.
#[tracing::instrument(skip(state, body))]
pub async fn resolve<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<ResolvedRequest>, ApiError> {
    let request_id = SupplierRequestId::new(body.require_integer("request_id")?);
    let resolution = parse_resolution(
        &body
            .text("action")?
            .ok_or_else(|| ApiError::missing("action"))?,
    )?;
    let note = body.text("description")?;

    let resolved = state
        .reconciliation
        .resolve(request_id, resolution, note)
        .await?;
    Ok(ApiResponse::ok(resolved))
}

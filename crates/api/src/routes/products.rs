//! Catalog endpoints and administrator actions on a product.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, ProductState, UserId};
use domain::{CreateSupplierRequest, RegisterProduct};
use serde::Serialize;
use store::{Product, Store, SupplierRequest};

use crate::error::ApiError;
use crate::input::{JsonBody, path_id};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Administrator action posted to `/products/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductAction {
    /// Opens a supplier request and flags the product.
    RequestRestock,
    /// Drops the pending-restock flag without touching stock.
    ClearRestock,
    Activate,
    Deactivate,
}

impl std::str::FromStr for ProductAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solicitar_pedido" | "request_restock" => Ok(ProductAction::RequestRestock),
            "limpiar_pedido" | "clear_restock" => Ok(ProductAction::ClearRestock),
            "activar" | "activate" => Ok(ProductAction::Activate),
            "inactivar" | "deactivate" => Ok(ProductAction::Deactivate),
            other => Err(ApiError::invalid("action", format!("unknown action '{other}'"))),
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ProductActionResult {
    Product(Product),
    Request(SupplierRequest),
}

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<ApiResponse<Vec<Product>>, ApiError> {
    Ok(ApiResponse::ok(state.stock.list().await?))
}

/// POST /products, a supplier submits a product for review.
#[tracing::instrument(skip(state, body))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, ApiResponse<Product>), ApiError> {
    let cmd = RegisterProduct {
        name: body.text("name")?.unwrap_or_default(),
        category: body.text("category")?,
        unit_price: body.require_decimal("unit_price")?,
        supplier_id: body.integer("supplier_id")?.map(UserId::new),
    };
    let product = state.stock.register(cmd).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(product)))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Product>, ApiError> {
    let id = ProductId::new(path_id(&id)?);
    Ok(ApiResponse::ok(state.stock.get(id).await?))
}

/// POST /products/{id}
#[tracing::instrument(skip(state, body))]
pub async fn act<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<ProductActionResult>, ApiError> {
    let id = ProductId::new(path_id(&id)?);
    let action: ProductAction = body
        .text("action")?
        .ok_or_else(|| ApiError::missing("action"))?
        .parse()?;
    tracing::debug!(?action, product_id = %id, "Product action");

    let result = match action {
        ProductAction::RequestRestock => {
            let request = state
                .supplier_requests
                .create(CreateSupplierRequest {
                    product_id: id,
                    quantity: body.require_integer("quantity")?,
                    description: body.text("description")?,
                })
                .await?;
            ProductActionResult::Request(request)
        }
        ProductAction::ClearRestock => {
            ProductActionResult::Product(state.stock.set_pending_restock(id, false).await?)
        }
        ProductAction::Activate => ProductActionResult::Product(
            state
                .stock
                .set_availability(id, ProductState::Available)
                .await?,
        ),
        ProductAction::Deactivate => ProductActionResult::Product(
            state
                .stock
                .set_availability(id, ProductState::Inactive)
                .await?,
        ),
    };
    Ok(ApiResponse::ok(result))
}

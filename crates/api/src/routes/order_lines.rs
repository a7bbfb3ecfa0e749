//! Order line CRUD and guest adoption endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderLineId, OrderLineState, ProductId, UserId};
use domain::{AdoptionReport, CreateOrderLine};
use store::{OrderLine, OrderLinePatch, Store};

use crate::error::ApiError;
use crate::input::{Fields, JsonBody, path_id, query_integer};
use crate::response::{ApiResponse, Deleted};
use crate::state::AppState;

fn patch_from(body: &Fields) -> Result<OrderLinePatch, ApiError> {
    let user = |key: &str| -> Result<Option<Option<UserId>>, ApiError> {
        Ok(body.nullable_integer(key)?.map(|id| id.map(UserId::new)))
    };
    Ok(OrderLinePatch {
        product_id: body.integer("product_id")?.map(ProductId::new),
        quantity: body.integer("quantity")?,
        unit_price: body.decimal("unit_price")?,
        subtotal: body.decimal("subtotal")?,
        user_id: user("user_id")?,
        seller_id: user("seller_id")?,
        paid_at: body.nullable_timestamp("paid_at")?,
        state: body.text("state")?.map(OrderLineState::from),
        customer_name: body.nullable_text("customer_name")?,
        customer_address: body.nullable_text("customer_address")?,
        customer_phone: body.nullable_text("customer_phone")?,
        document: body.nullable_text("document")?,
    })
}

/// GET /orderlines, optionally filtered with `?userId=`.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<Vec<OrderLine>>, ApiError> {
    let lines = match query_integer(&params, "user_id")? {
        Some(user) => state.order_lines.list_by_user(UserId::new(user)).await?,
        None => state.order_lines.list_all().await?,
    };
    Ok(ApiResponse::ok(lines))
}

/// POST /orderlines
#[tracing::instrument(skip(state, body))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, ApiResponse<OrderLine>), ApiError> {
    let cmd = CreateOrderLine {
        product_id: ProductId::new(body.require_integer("product_id")?),
        quantity: body.require_integer("quantity")?,
        unit_price: body.require_decimal("unit_price")?,
        subtotal: body.decimal("subtotal")?,
        user_id: body.integer("user_id")?.map(UserId::new),
        seller_id: body.integer("seller_id")?.map(UserId::new),
        paid_at: body.timestamp("paid_at")?,
        state: body.text("state")?.map(OrderLineState::from),
        customer_name: body.text("customer_name")?,
        customer_address: body.text("customer_address")?,
        customer_phone: body.text("customer_phone")?,
        document: body.text("document")?,
    };
    let line = state.order_lines.create(cmd).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(line)))
}

/// GET /orderlines/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<OrderLine>, ApiError> {
    let id = OrderLineId::new(path_id(&id)?);
    Ok(ApiResponse::ok(state.order_lines.get(id).await?))
}

/// PUT /orderlines/{id}, partial update.
#[tracing::instrument(skip(state, body))]
pub async fn update<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<OrderLine>, ApiError> {
    let id = OrderLineId::new(path_id(&id)?);
    let patch = patch_from(&body)?;
    Ok(ApiResponse::ok(state.order_lines.update(id, patch).await?))
}

/// DELETE /orderlines/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<ApiResponse<Deleted<OrderLineId>>, ApiError> {
    let id = OrderLineId::new(path_id(&id)?);
    let id = state.order_lines.delete(id).await?;
    Ok(ApiResponse::ok(Deleted { id }))
}

/// POST /orderlines/adopt, attaches guest lines to an account after sign-up.
#[tracing::instrument(skip(state, body))]
pub async fn adopt<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<AdoptionReport>, ApiError> {
    let document = body.text("document")?.unwrap_or_default();
    let user_id = UserId::new(body.require_integer("user_id")?);
    Ok(ApiResponse::ok(
        state.adoption.adopt(&document, user_id).await?,
    ))
}

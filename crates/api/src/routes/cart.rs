//! Shopping cart endpoints for the signed-in user.
//!
//! Placing and removing items run as compensating sagas so stock always
//! matches the pending lines; checkout confirms the user's lines in one go.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use common::{OrderLineId, ProductId};
use domain::ConfirmationReport;
use saga::{AddToCart, CartItemAdded, CartItemRemoved};
use store::Store;

use crate::error::ApiError;
use crate::input::{JsonBody, path_id};
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /cart/items
#[tracing::instrument(skip(state, headers, body))]
pub async fn add_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, ApiResponse<CartItemAdded>), ApiError> {
    let identity = state.require_identity(&headers)?;

    let cmd = AddToCart {
        user_id: identity.user_id,
        product_id: ProductId::new(body.require_integer("product_id")?),
        quantity: body.require_integer("quantity")?,
        customer_name: body.text("customer_name")?.or(identity.display_name),
        customer_address: body.text("customer_address")?,
        customer_phone: body.text("customer_phone")?,
        document: body.text("document")?,
    };
    let added = state.cart.add_item(cmd).await?;
    Ok((StatusCode::CREATED, ApiResponse::ok(added)))
}

/// DELETE /cart/items/{id}
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<ApiResponse<CartItemRemoved>, ApiError> {
    let identity = state.require_identity(&headers)?;
    let id = OrderLineId::new(path_id(&id)?);
    let removed = state.cart.remove_item(identity.user_id, id).await?;
    Ok(ApiResponse::ok(removed))
}

/// POST /cart/checkout
///
/// Without `order_line_ids` every pending line of the caller is confirmed.
#[tracing::instrument(skip(state, headers, body))]
pub async fn checkout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<ApiResponse<ConfirmationReport>, ApiError> {
    let identity = state.require_identity(&headers)?;
    let ids = body
        .integer_list("order_line_ids")?
        .map(|ids| ids.into_iter().map(OrderLineId::new).collect());

    let report = state.confirmation.confirm(identity.user_id, ids).await?;
    Ok(ApiResponse::ok(report))
}

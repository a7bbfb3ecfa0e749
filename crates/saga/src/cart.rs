//! Cart saga definitions: step names, commands and outcomes.

use common::{OrderLineId, ProductId, UserId};
use serde::Serialize;
use store::{OrderLine, Product};

use crate::instance::SagaInstance;

/// Add-item step 1: take the quantity out of an available product's stock.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";
/// Add-item step 2: write the pending order line.
pub const STEP_INSERT_LINE: &str = "insert_order_line";
/// Remove-item step 1: put the line's reservation back into stock.
pub const STEP_RELEASE_STOCK: &str = "release_stock";
/// Remove-item step 2: delete the order line if it is still pending.
pub const STEP_DELETE_LINE: &str = "delete_order_line";

/// Puts `quantity` units of a product into the acting user's cart.
#[derive(Debug, Clone, Default)]
pub struct AddToCart {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemAdded {
    pub line: OrderLine,
    /// The product after the reservation.
    pub product: Product,
    pub saga: SagaInstance,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemRemoved {
    pub order_line_id: OrderLineId,
    /// Units given back to stock; zero for lines that never reserved any.
    pub released: i64,
    /// The product after the release.
    pub product: Product,
    pub saga: SagaInstance,
}

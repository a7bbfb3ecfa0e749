//! Product rows of the stock ledger.

use chrono::{DateTime, Utc};
use common::{ProductState, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ProductId;

/// A product as stored in the ledger.
///
/// `stock` is never negative: every mutation goes through
/// [`ProductStore::adjust_stock`](crate::ProductStore::adjust_stock), which
/// refuses deltas that would cross zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub stock: i64,
    pub state: ProductState,
    pub pending_restock: bool,
    pub supplier_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

/// A supplier submission. New products start `New` with zero stock.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub supplier_id: Option<UserId>,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, unit_price: Decimal) -> Self {
        Self {
            name: name.into(),
            category: None,
            unit_price,
            supplier_id: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_supplier(mut self, supplier_id: UserId) -> Self {
        self.supplier_id = Some(supplier_id);
        self
    }
}

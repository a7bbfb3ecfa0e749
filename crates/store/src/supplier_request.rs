//! Supplier replenishment requests (`pedidosproveedor`).

use chrono::{DateTime, Utc};
use common::RequestState;
use serde::{Deserialize, Serialize};

use crate::{Product, ProductId, SupplierRequestId};

/// A restock request for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierRequest {
    pub id: SupplierRequestId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub state: RequestState,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSupplierRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub description: Option<String>,
}

/// Partial update of a request that is still pending.
///
/// The state is deliberately absent: it only moves through
/// [`SupplierRequestStore::resolve_supplier_request`](crate::SupplierRequestStore::resolve_supplier_request).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SupplierRequestPatch {
    pub product_id: Option<ProductId>,
    pub quantity: Option<i64>,
    pub description: Option<Option<String>>,
}

impl SupplierRequestPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(self, request: &mut SupplierRequest) {
        if let Some(v) = self.product_id {
            request.product_id = v;
        }
        if let Some(v) = self.quantity {
            request.quantity = v;
        }
        if let Some(v) = self.description {
            request.description = v;
        }
    }
}

/// Outcome requested for a pending supplier request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    /// The state the request ends up in.
    pub fn target_state(&self) -> RequestState {
        match self {
            Resolution::Accept => RequestState::Accepted,
            Resolution::Reject => RequestState::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Accept => "accept",
            Resolution::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resolved request together with the product it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRequest {
    pub request: SupplierRequest,
    pub product: Product,
}

/// The description kept after resolution: the original one unless it is
/// blank, in which case the resolution note replaces it.
pub fn merge_note(existing: Option<&str>, note: Option<&str>) -> Option<String> {
    match existing {
        Some(text) if !text.trim().is_empty() => Some(text.to_string()),
        _ => note.map(str::to_string),
    }
}

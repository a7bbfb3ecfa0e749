//! Domain error types.

use common::{OrderLineId, ProductId, ProductState, SupplierRequestId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An input field failed validation. Nothing was written.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// An update carried no recognised field.
    #[error("no fields to update")]
    NoFieldsToUpdate,

    /// The addressed row does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The supplier request does not exist or has already left `pending`.
    #[error("supplier request {0} not found or already resolved")]
    NotFoundOrAlreadyResolved(SupplierRequestId),

    /// A referenced row does not exist.
    #[error("{referenced} does not exist")]
    ForeignKeyViolation { referenced: &'static str },

    /// The product cannot move between these availability states.
    #[error("cannot change product state from {from} to {to}")]
    InvalidTransition { from: ProductState, to: ProductState },

    /// Not enough stock to cover the requested decrement.
    #[error("insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// Some order lines cannot be confirmed for this user; none were.
    #[error("order lines cannot be confirmed: {}", format_ids(.ids))]
    NotConfirmable { ids: Vec<OrderLineId> },

    /// The cart line was confirmed or removed while the removal was running.
    #[error("order line {0} is no longer pending")]
    NoLongerPending(OrderLineId),

    /// The product is not currently sellable.
    #[error("product {product_id} is not available (state {state})")]
    Unavailable {
        product_id: ProductId,
        state: ProductState,
    },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

fn format_ids(ids: &[OrderLineId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl DomainError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true when the store could not be reached at all.
    pub fn is_unavailable_store(&self) -> bool {
        matches!(self, DomainError::Store(StoreError::Connection(_)))
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::ForeignKeyViolation { referenced } => {
                DomainError::ForeignKeyViolation { referenced }
            }
            StoreError::InsufficientStock {
                product_id,
                available,
                delta,
            } => DomainError::InsufficientStock {
                product_id,
                available,
                requested: delta.saturating_neg(),
            },
            StoreError::StockOutOfRange { product_id, delta } => DomainError::validation(
                "stock",
                format!("adjustment {delta} puts product {product_id} out of range"),
            ),
            StoreError::Unavailable { product_id, state } => {
                DomainError::Unavailable { product_id, state }
            }
            other => DomainError::Store(other),
        }
    }
}

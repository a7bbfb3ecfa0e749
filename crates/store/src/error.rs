use common::ProductState;
use thiserror::Error;

use crate::ProductId;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row addressed by a mutation does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A referenced row does not exist (foreign key rejected by the store).
    #[error("referenced {referenced} does not exist")]
    ForeignKeyViolation { referenced: &'static str },

    /// A stock adjustment would have left the product below zero.
    #[error(
        "insufficient stock for product {product_id}: {available} available, adjustment {delta}"
    )]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        delta: i64,
    },

    /// A stock adjustment would push the counter past its numeric range.
    #[error("stock adjustment {delta} for product {product_id} is out of range")]
    StockOutOfRange { product_id: ProductId, delta: i64 },

    /// A reservation hit a product that is not currently sellable.
    #[error("product {product_id} is not available (state {state})")]
    Unavailable {
        product_id: ProductId,
        state: ProductState,
    },

    /// The database could not be reached.
    #[error("Database unavailable: {0}")]
    Connection(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Decode(String),

    /// Failure injected through the in-memory store's test switches.
    #[error("Injected failure: {0}")]
    InjectedFailure(&'static str),
}

impl StoreError {
    pub(crate) fn product_not_found(id: ProductId) -> Self {
        StoreError::NotFound {
            entity: "product",
            id: id.as_i64(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                // Every foreign key in the schema points at `products`.
                StoreError::ForeignKeyViolation {
                    referenced: "product",
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
            other => StoreError::Database(other),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_a_connection_error() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, StoreError::Connection(_)));
    }

    #[test]
    fn row_not_found_stays_a_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[test]
    fn out_of_range_message_names_the_delta() {
        let err = StoreError::StockOutOfRange {
            product_id: ProductId::new(4),
            delta: i64::MAX,
        };
        assert_eq!(
            err.to_string(),
            format!("stock adjustment {} for product 4 is out of range", i64::MAX)
        );
    }

    #[test]
    fn insufficient_stock_message_names_the_product() {
        let err = StoreError::InsufficientStock {
            product_id: ProductId::new(10),
            available: 2,
            delta: -5,
        };
        assert_eq!(
            err.to_string(),
            "insufficient stock for product 10: 2 available, adjustment -5"
        );
    }
}

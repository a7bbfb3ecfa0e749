use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares an integer row identifier.
///
/// Every table keys its rows by a database-generated `BIGSERIAL`, so the
/// wrappers only exist to keep product ids from being passed where an order
/// line id is expected.
macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database value without any range check.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Returns the raw database value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// Returns true for ids a client is allowed to reference (> 0).
            pub const fn is_positive(&self) -> bool {
                self.0 > 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

row_id!(
    /// Identifier of a product in the stock ledger.
    ProductId
);

row_id!(
    /// Identifier of an order line (`detallepedido`).
    OrderLineId
);

row_id!(
    /// Identifier of a supplier replenishment request (`pedidosproveedor`).
    SupplierRequestId
);

row_id!(
    /// Identifier of a user account owned by the identity collaborator.
    ///
    /// Legacy rows may carry `0` to mean "no owner"; see [`UserId::is_unset`].
    UserId
);

impl UserId {
    /// Returns true for the legacy "no owner" marker.
    pub const fn is_unset(&self) -> bool {
        self.0 == 0
    }
}

/// Unique identifier for one saga execution.
///
/// Sagas are never persisted, the id only correlates log lines and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SagaId(Uuid);

impl SagaId {
    /// Creates a new random saga ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SagaId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SagaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

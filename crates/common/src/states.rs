//! Lifecycle states shared by storage and domain layers.

use serde::{Deserialize, Serialize};

/// Error returned when a stored or submitted state name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownState {
    pub kind: &'static str,
    pub value: String,
}

impl std::fmt::Display for UnknownState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} state '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownState {}

/// Availability of a product in the catalog.
///
/// State transitions:
/// ```text
/// New ──► Available ◄──► Inactive
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
    /// Submitted by a supplier, not yet sellable.
    #[default]
    New,

    /// Listed in the catalog.
    Available,

    /// Discontinued by an administrator.
    Inactive,
}

impl ProductState {
    /// Returns true if `self -> target` is one of the allowed transitions.
    pub fn can_transition_to(&self, target: ProductState) -> bool {
        Self::sources_for(target).contains(self)
    }

    /// Returns every state that may move into `target`.
    pub fn sources_for(target: ProductState) -> &'static [ProductState] {
        match target {
            ProductState::Available => &[ProductState::New, ProductState::Inactive],
            ProductState::Inactive => &[ProductState::Available],
            ProductState::New => &[],
        }
    }

    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductState::New => "new",
            ProductState::Available => "available",
            ProductState::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for ProductState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" | "nuevo" | "unavailable" | "no_disponible" => Ok(ProductState::New),
            "available" | "disponible" => Ok(ProductState::Available),
            "inactive" | "inactivo" => Ok(ProductState::Inactive),
            _ => Err(UnknownState {
                kind: "product",
                value: s.to_string(),
            }),
        }
    }
}

/// Lifecycle state of an order line.
///
/// Only `Pending -> Confirmed` is driven by this system; other values written
/// by back-office tools are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum OrderLineState {
    /// In a cart, not yet checked out.
    #[default]
    Pending,

    /// Checkout completed.
    Confirmed,

    /// Any free-text state set by other tooling.
    Other(String),
}

impl OrderLineState {
    /// Returns true if the line still sits in a cart.
    pub fn is_pending(&self) -> bool {
        matches!(self, OrderLineState::Pending)
    }

    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &str {
        match self {
            OrderLineState::Pending => "pending",
            OrderLineState::Confirmed => "confirmed",
            OrderLineState::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for OrderLineState {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => OrderLineState::Pending,
            "confirmed" | "confirmado" => OrderLineState::Confirmed,
            _ => OrderLineState::Other(s.trim().to_string()),
        }
    }
}

impl From<&str> for OrderLineState {
    fn from(s: &str) -> Self {
        OrderLineState::from(s.to_string())
    }
}

impl From<OrderLineState> for String {
    fn from(state: OrderLineState) -> Self {
        match state {
            OrderLineState::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for OrderLineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a supplier replenishment request.
///
/// State transitions (one-way, exactly once):
/// ```text
/// Pending ──┬──► Accepted
///           └──► Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl RequestState {
    /// Returns true if the request can still be resolved.
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }

    /// Returns true for the two resolved states.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Returns the state name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Accepted => "accepted",
            RequestState::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RequestState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "pendiente" => Ok(RequestState::Pending),
            "accepted" | "aceptado" => Ok(RequestState::Accepted),
            "rejected" | "rechazado" => Ok(RequestState::Rejected),
            _ => Err(UnknownState {
                kind: "supplier request",
                value: s.to_string(),
            }),
        }
    }
}

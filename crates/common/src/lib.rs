//! Shared identifiers and lifecycle states.
//!
//! Everything here is plain data: the rules that decide *when* a state may
//! change live in the `domain` crate and are enforced by the `store` crate's
//! conditional updates.

pub mod states;
pub mod types;

pub use states::{OrderLineState, ProductState, RequestState};
pub use types::{OrderLineId, ProductId, SagaId, SupplierRequestId, UserId};

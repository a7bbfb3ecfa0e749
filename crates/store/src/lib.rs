//! Relational storage for the DrinkWare order and replenishment workflow.
//!
//! The [`store`] traits are the seam every service is written against. Two
//! implementations ship with the crate:
//!
//! - [`PostgresStore`]: `sqlx` over a `PgPool`, using conditional updates and
//!   transactions for every read-modify-write.
//! - [`InMemoryStore`]: all tables behind a single lock, used by tests and by
//!   the server when no `DATABASE_URL` is configured.

pub mod error;
pub mod memory;
pub mod order_line;
pub mod postgres;
pub mod product;
pub mod store;
pub mod supplier_request;

pub use common::{OrderLineId, ProductId, SupplierRequestId, UserId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use order_line::{Confirmation, NewOrderLine, OrderLine, OrderLinePatch};
pub use postgres::PostgresStore;
pub use product::{NewProduct, Product};
pub use store::{OrderLineStore, ProductStore, Store, SupplierRequestStore};
pub use supplier_request::{
    NewSupplierRequest, Resolution, ResolvedRequest, SupplierRequest, SupplierRequestPatch,
};

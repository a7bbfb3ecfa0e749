//! Business rules for the DrinkWare order lifecycle.
//!
//! Every service here is a thin, validated layer over a [`store::Store`]:
//!
//! - [`StockLedger`]: product registration, stock deltas, availability
//! - [`OrderLineService`]: order line CRUD
//! - [`AdoptionService`]: claiming guest lines by identification document
//! - [`ConfirmationService`]: all-or-nothing checkout
//! - [`SupplierRequestService`]: replenishment request CRUD
//! - [`ReconciliationEngine`]: exactly-once resolution of supplier requests
//!
//! Validation always completes before the first write.

pub mod adoption;
pub mod confirmation;
pub mod error;
pub mod order_lines;
pub mod reconciliation;
pub mod stock;
pub mod supplier_requests;
pub mod validation;

pub use adoption::{AdoptionReport, AdoptionService};
pub use confirmation::{ConfirmationReport, ConfirmationService};
pub use error::{DomainError, Result};
pub use order_lines::{CreateOrderLine, OrderLineService};
pub use reconciliation::ReconciliationEngine;
pub use stock::{RegisterProduct, StockLedger};
pub use supplier_requests::{CreateSupplierRequest, SupplierRequestService};

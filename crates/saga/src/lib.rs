//! Compensating workflows for the shopping cart.
//!
//! Two sagas keep stock and order lines consistent without a cross-table
//! transaction:
//!
//! - add item: 1. reserve stock, 2. insert the pending order line
//! - remove item: 1. release stock, 2. delete the order line
//!
//! If step 2 fails, step 1 is undone with the opposite stock delta.

pub mod cart;
pub mod coordinator;
pub mod error;
pub mod instance;
pub mod state;

pub use cart::{AddToCart, CartItemAdded, CartItemRemoved};
pub use coordinator::CartCoordinator;
pub use error::SagaError;
pub use instance::{CartSagaKind, SagaInstance};
pub use state::SagaState;

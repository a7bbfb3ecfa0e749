use std::sync::Arc;

use domain::{
    AdoptionService, ConfirmationService, OrderLineService, ReconciliationEngine, StockLedger,
    SupplierRequestService,
};
use saga::CartCoordinator;
use store::Store;

use crate::error::ApiError;
use crate::identity::{HeaderIdentity, Identity, IdentityProvider};

/// Shared application state accessible from all handlers.
///
/// Every service holds a clone of the same store handle.
pub struct AppState<S: Store> {
    pub stock: StockLedger<S>,
    pub order_lines: OrderLineService<S>,
    pub adoption: AdoptionService<S>,
    pub confirmation: ConfirmationService<S>,
    pub supplier_requests: SupplierRequestService<S>,
    pub reconciliation: ReconciliationEngine<S>,
    pub cart: CartCoordinator<S>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S: Store> AppState<S> {
    pub fn new(store: S, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            stock: StockLedger::new(store.clone()),
            order_lines: OrderLineService::new(store.clone()),
            adoption: AdoptionService::new(store.clone()),
            confirmation: ConfirmationService::new(store.clone()),
            supplier_requests: SupplierRequestService::new(store.clone()),
            reconciliation: ReconciliationEngine::new(store.clone()),
            cart: CartCoordinator::new(store),
            identity,
        }
    }

    /// Identifies the caller or fails with 401.
    pub fn require_identity(&self, headers: &axum::http::HeaderMap) -> Result<Identity, ApiError> {
        self.identity
            .identify(headers)
            .ok_or(ApiError::Unauthorized)
    }
}

/// Builds the state with the header-based identity provider.
pub fn create_state<S: Store>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, Arc::new(HeaderIdentity)))
}

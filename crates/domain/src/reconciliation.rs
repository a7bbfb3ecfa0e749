//! Replenishment reconciliation: applies the outcome of a supplier request to
//! the product stock exactly once.

use common::SupplierRequestId;
use store::{Resolution, ResolvedRequest, Store};

use crate::{DomainError, Result, validation};

/// Resolves pending supplier requests.
///
/// The claim of the pending row, the stock increment and the pending-restock
/// reset happen in one store transaction. Of any number of concurrent calls
/// for the same request exactly one succeeds; the rest see
/// `NotFoundOrAlreadyResolved`.
#[derive(Clone)]
pub struct ReconciliationEngine<S: Store> {
    store: S,
}

impl<S: Store> ReconciliationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, note))]
    pub async fn resolve(
        &self,
        request_id: SupplierRequestId,
        resolution: Resolution,
        note: Option<String>,
    ) -> Result<ResolvedRequest> {
        validation::positive_id("request_id", request_id.as_i64())?;
        let note = validation::optional_text(note);

        let Some(resolved) = self
            .store
            .resolve_supplier_request(request_id, resolution, note)
            .await?
        else {
            tracing::debug!("Request missing or already resolved");
            return Err(DomainError::NotFoundOrAlreadyResolved(request_id));
        };

        metrics::counter!(
            "supplier_requests_resolved_total",
            "outcome" => resolution.as_str()
        )
        .increment(1);
        tracing::info!(
            product_id = %resolved.product.id,
            stock = resolved.product.stock,
            "Supplier request resolved"
        );

        Ok(resolved)
    }
}

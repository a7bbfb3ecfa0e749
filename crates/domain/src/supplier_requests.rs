//! Supplier request ledger: CRUD over replenishment requests.
//!
//! Resolution is not here; see [`crate::reconciliation`].

use common::{ProductId, SupplierRequestId};
use store::{NewSupplierRequest, Store, SupplierRequest, SupplierRequestPatch};

use crate::{DomainError, Result, validation};

#[derive(Debug, Clone)]
pub struct CreateSupplierRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SupplierRequestService<S: Store> {
    store: S,
}

impl<S: Store> SupplierRequestService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Opens a pending request and flags the product as awaiting restock in
    /// one store write.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, cmd: CreateSupplierRequest) -> Result<SupplierRequest> {
        validation::positive_id("product_id", cmd.product_id.as_i64())?;
        validation::positive_quantity("quantity", cmd.quantity)?;

        let request = self
            .store
            .insert_supplier_request(NewSupplierRequest {
                product_id: cmd.product_id,
                quantity: cmd.quantity,
                description: validation::optional_text(cmd.description),
            })
            .await?;

        tracing::info!(request_id = %request.id, "Supplier request opened");
        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: SupplierRequestId) -> Result<SupplierRequest> {
        self.store
            .get_supplier_request(id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "supplier request",
                id: id.as_i64(),
            })
    }

    pub async fn list_all(&self) -> Result<Vec<SupplierRequest>> {
        Ok(self.store.list_supplier_requests().await?)
    }

    /// Edits a request that is still pending. The state never changes here.
    #[tracing::instrument(skip(self))]
    pub async fn update(
        &self,
        id: SupplierRequestId,
        mut patch: SupplierRequestPatch,
    ) -> Result<SupplierRequest> {
        if patch.is_empty() {
            return Err(DomainError::NoFieldsToUpdate);
        }
        if let Some(product_id) = patch.product_id {
            validation::positive_id("product_id", product_id.as_i64())?;
        }
        if let Some(quantity) = patch.quantity {
            validation::positive_quantity("quantity", quantity)?;
        }
        patch.description = patch.description.map(validation::optional_text);

        self.store
            .update_pending_supplier_request(id, patch)
            .await?
            .ok_or(DomainError::NotFoundOrAlreadyResolved(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: SupplierRequestId) -> Result<SupplierRequestId> {
        if self.store.delete_supplier_request(id).await? {
            Ok(id)
        } else {
            Err(DomainError::NotFound {
                entity: "supplier request",
                id: id.as_i64(),
            })
        }
    }
}

//! Product stock ledger rules.

use common::{ProductId, ProductState, UserId};
use rust_decimal::Decimal;
use store::{NewProduct, Product, Store};

use crate::{DomainError, Result, validation};

/// A supplier submitting a product for the catalog.
#[derive(Debug, Clone)]
pub struct RegisterProduct {
    pub name: String,
    pub category: Option<String>,
    pub unit_price: Decimal,
    pub supplier_id: Option<UserId>,
}

/// Service owning every change to product stock and availability.
#[derive(Clone)]
pub struct StockLedger<S: Store> {
    store: S,
}

impl<S: Store> StockLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Registers a supplier submission. The product starts `New` with no stock.
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, cmd: RegisterProduct) -> Result<Product> {
        let name = validation::non_blank("name", &cmd.name)?;
        let unit_price = validation::non_negative_amount("unit_price", cmd.unit_price)?;
        if let Some(supplier) = cmd.supplier_id {
            validation::positive_id("supplier_id", supplier.as_i64())?;
        }

        let product = self
            .store
            .insert_product(NewProduct {
                name,
                category: validation::optional_text(cmd.category),
                unit_price,
                supplier_id: cmd.supplier_id,
            })
            .await?;

        tracing::info!(product_id = %product.id, "Product registered");
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "product",
                id: id.as_i64(),
            })
    }

    pub async fn list(&self) -> Result<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }

    /// Applies a signed stock delta.
    ///
    /// A decrement larger than the available stock fails with
    /// `InsufficientStock` and leaves the product untouched.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product> {
        validation::positive_id("product_id", id.as_i64())?;
        if delta == 0 {
            return Err(DomainError::validation("delta", "must not be zero"));
        }

        let product = self.store.adjust_stock(id, delta).await?;

        let direction = if delta > 0 { "in" } else { "out" };
        metrics::counter!("stock_adjustments_total", "direction" => direction).increment(1);
        tracing::debug!(stock = product.stock, "Stock adjusted");

        Ok(product)
    }

    /// Takes `quantity` units out of an `Available` product's stock.
    ///
    /// Availability and the amount are checked by the same conditional write,
    /// so a product deactivated mid-request is never sold.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, id: ProductId, quantity: i64) -> Result<Product> {
        validation::positive_id("product_id", id.as_i64())?;
        validation::positive_quantity("quantity", quantity)?;

        let product = self.store.reserve_stock(id, quantity).await?;

        metrics::counter!("stock_adjustments_total", "direction" => "out").increment(1);
        tracing::debug!(stock = product.stock, "Stock reserved");

        Ok(product)
    }

    /// Moves a product between availability states.
    ///
    /// The check and the write are one compare-and-swap on the current state.
    #[tracing::instrument(skip(self))]
    pub async fn set_availability(&self, id: ProductId, target: ProductState) -> Result<Product> {
        validation::positive_id("product_id", id.as_i64())?;
        let sources = ProductState::sources_for(target);

        if !sources.is_empty()
            && let Some(product) = self
                .store
                .compare_and_set_product_state(id, sources, target)
                .await?
        {
            tracing::info!(state = %product.state, "Product availability changed");
            return Ok(product);
        }

        // The guard missed: report why.
        let current = self.get(id).await?;
        Err(DomainError::InvalidTransition {
            from: current.state,
            to: target,
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn set_pending_restock(&self, id: ProductId, pending: bool) -> Result<Product> {
        validation::positive_id("product_id", id.as_i64())?;
        Ok(self.store.set_pending_restock(id, pending).await?)
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn ledger() -> StockLedger<InMemoryStore> {
        StockLedger::new(InMemoryStore::new())
    }

    fn submission(name: &str) -> RegisterProduct {
        RegisterProduct {
            name: name.to_string(),
            category: Some("  ".to_string()),
            unit_price: Decimal::from(3990),
            supplier_id: Some(UserId::new(2)),
        }
    }

    #[tokio::test]
    async fn register_trims_and_starts_new() {
        let ledger = ledger();
        let product = ledger.register(submission("  Gin London Dry ")).await.unwrap();

        assert_eq!(product.name, "Gin London Dry");
        assert_eq!(product.category, None);
        assert_eq!(product.state, ProductState::New);
        assert_eq!(product.stock, 0);
    }

    #[tokio::test]
    async fn register_rejects_negative_price() {
        let ledger = ledger();
        let mut cmd = submission("Gin");
        cmd.unit_price = Decimal::from(-1);

        let err = ledger.register(cmd).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Validation {
                field: "unit_price",
                ..
            }
        ));
        assert!(ledger.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_delta_is_rejected() {
        let ledger = ledger();
        let product = ledger.register(submission("Gin")).await.unwrap();
        let err = ledger.adjust_stock(product.id, 0).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "delta", .. }));
    }

    #[tokio::test]
    async fn overdraw_fails_and_keeps_stock() {
        let ledger = ledger();
        let product = ledger.register(submission("Gin")).await.unwrap();
        ledger.adjust_stock(product.id, 3).await.unwrap();

        let err = ledger.adjust_stock(product.id, -4).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            }
        ));
        assert_eq!(ledger.get(product.id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn overflowing_delta_is_a_validation_error() {
        let ledger = ledger();
        let product = ledger.register(submission("Gin")).await.unwrap();
        ledger.adjust_stock(product.id, 3).await.unwrap();

        let err = ledger.adjust_stock(product.id, i64::MAX).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "stock", .. }));
        assert_eq!(ledger.get(product.id).await.unwrap().stock, 3);
    }

    #[tokio::test]
    async fn reserve_refuses_products_that_are_not_available() {
        let ledger = ledger();
        let product = ledger.register(submission("Gin")).await.unwrap();
        ledger.adjust_stock(product.id, 6).await.unwrap();

        let err = ledger.reserve(product.id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Unavailable {
                state: ProductState::New,
                ..
            }
        ));

        ledger
            .set_availability(product.id, ProductState::Available)
            .await
            .unwrap();
        assert_eq!(ledger.reserve(product.id, 2).await.unwrap().stock, 4);

        let err = ledger.reserve(product.id, 5).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InsufficientStock {
                available: 4,
                requested: 5,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn availability_follows_the_state_machine() {
        let ledger = ledger();
        let product = ledger.register(submission("Gin")).await.unwrap();

        let err = ledger
            .set_availability(product.id, ProductState::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                from: ProductState::New,
                to: ProductState::Inactive
            }
        ));

        let available = ledger
            .set_availability(product.id, ProductState::Available)
            .await
            .unwrap();
        assert_eq!(available.state, ProductState::Available);

        let inactive = ledger
            .set_availability(product.id, ProductState::Inactive)
            .await
            .unwrap();
        assert_eq!(inactive.state, ProductState::Inactive);

        let back = ledger
            .set_availability(product.id, ProductState::Available)
            .await
            .unwrap();
        assert_eq!(back.state, ProductState::Available);

        let err = ledger
            .set_availability(product.id, ProductState::New)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn availability_of_missing_product() {
        let ledger = ledger();
        let err = ledger
            .set_availability(ProductId::new(42), ProductState::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "product", id: 42 }));
    }
}

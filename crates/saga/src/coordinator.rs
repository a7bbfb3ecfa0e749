//! Saga coordinator for cart placement and removal.

use std::time::Instant;

use common::{OrderLineId, OrderLineState, ProductId, ProductState, UserId};
use domain::{CreateOrderLine, DomainError, OrderLineService, StockLedger, validation};
use store::Store;

use crate::cart::{
    AddToCart, CartItemAdded, CartItemRemoved, STEP_DELETE_LINE, STEP_INSERT_LINE,
    STEP_RELEASE_STOCK, STEP_RESERVE_STOCK,
};
use crate::error::{Result, SagaError};
use crate::instance::{CartSagaKind, SagaInstance};

/// A completed stock adjustment and the delta that undoes it.
struct StockUndo {
    step: &'static str,
    product_id: ProductId,
    delta: i64,
}

/// Orchestrates the two-step cart sagas.
///
/// Both sagas pair a stock adjustment with an order line write. The stock
/// step always runs first; if the order line step fails the adjustment is
/// reversed with the opposite delta. Each line remembers how much it
/// reserved, and removal gives back exactly that.
#[derive(Clone)]
pub struct CartCoordinator<S: Store> {
    stock: StockLedger<S>,
    order_lines: OrderLineService<S>,
}

impl<S: Store> CartCoordinator<S> {
    pub fn new(store: S) -> Self {
        Self {
            stock: StockLedger::new(store.clone()),
            order_lines: OrderLineService::new(store),
        }
    }

    /// Reserves stock and writes a pending order line owned by the user.
    ///
    /// The product must be `Available` when the stock is taken. The line is
    /// priced at the product's current unit price.
    #[tracing::instrument(skip(self), fields(saga_kind = "add_item"))]
    pub async fn add_item(&self, cmd: AddToCart) -> Result<CartItemAdded> {
        validation::positive_id("user_id", cmd.user_id.as_i64())?;
        validation::positive_quantity("quantity", cmd.quantity)?;

        let product = self.stock.get(cmd.product_id).await?;
        // Refuse early; the reserve step checks availability again.
        if product.state != ProductState::Available {
            return Err(DomainError::Unavailable {
                product_id: product.id,
                state: product.state,
            }
            .into());
        }

        let started = Instant::now();
        let mut saga = SagaInstance::new(CartSagaKind::AddItem);
        saga.start()?;
        metrics::counter!("cart_saga_executions_total", "kind" => saga.kind().as_str())
            .increment(1);

        tracing::info!(step = STEP_RESERVE_STOCK, "saga step started");
        let reserved = match self.stock.reserve(product.id, cmd.quantity).await {
            Ok(reserved) => {
                saga.step_completed(STEP_RESERVE_STOCK);
                reserved
            }
            Err(e) => {
                return Err(self
                    .unwind(&mut saga, STEP_RESERVE_STOCK, e, None, started)
                    .await);
            }
        };

        tracing::info!(step = STEP_INSERT_LINE, "saga step started");
        let create = CreateOrderLine {
            product_id: product.id,
            quantity: cmd.quantity,
            unit_price: product.unit_price,
            user_id: Some(cmd.user_id),
            state: Some(OrderLineState::Pending),
            customer_name: cmd.customer_name,
            customer_address: cmd.customer_address,
            customer_phone: cmd.customer_phone,
            document: cmd.document,
            ..Default::default()
        };
        match self.order_lines.create_reserved(create).await {
            Ok(line) => {
                saga.step_completed(STEP_INSERT_LINE);
                saga.complete()?;
                record_completed(&saga, started);
                Ok(CartItemAdded {
                    line,
                    product: reserved,
                    saga,
                })
            }
            Err(e) => {
                let undo = StockUndo {
                    step: STEP_RESERVE_STOCK,
                    product_id: product.id,
                    delta: cmd.quantity,
                };
                Err(self
                    .unwind(&mut saga, STEP_INSERT_LINE, e, Some(undo), started)
                    .await)
            }
        }
    }

    /// Returns a pending cart line's reservation to stock and deletes the line.
    ///
    /// Only the owner can remove a line; anyone else sees it as missing. The
    /// delete only matches a line that is still pending, so a checkout that
    /// lands first keeps its line and the release is taken back.
    #[tracing::instrument(skip(self), fields(saga_kind = "remove_item"))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        order_line_id: OrderLineId,
    ) -> Result<CartItemRemoved> {
        validation::positive_id("user_id", user_id.as_i64())?;
        validation::positive_id("order_line_id", order_line_id.as_i64())?;

        let line = self.order_lines.get(order_line_id).await?;
        if line.user_id != Some(user_id) {
            return Err(DomainError::NotFound {
                entity: "order line",
                id: order_line_id.as_i64(),
            }
            .into());
        }
        if !line.state.is_pending() {
            return Err(DomainError::validation(
                "order_line_id",
                "only pending lines can be removed from the cart",
            )
            .into());
        }

        let started = Instant::now();
        let mut saga = SagaInstance::new(CartSagaKind::RemoveItem);
        saga.start()?;
        metrics::counter!("cart_saga_executions_total", "kind" => saga.kind().as_str())
            .increment(1);

        let reserved = line.reserved_quantity;
        let product = if reserved > 0 {
            tracing::info!(step = STEP_RELEASE_STOCK, "saga step started");
            match self.stock.adjust_stock(line.product_id, reserved).await {
                Ok(released) => {
                    saga.step_completed(STEP_RELEASE_STOCK);
                    released
                }
                Err(e) => {
                    return Err(self
                        .unwind(&mut saga, STEP_RELEASE_STOCK, e, None, started)
                        .await);
                }
            }
        } else {
            // The line never took stock, so nothing goes back.
            tracing::debug!(order_line_id = %order_line_id, "no reservation to release");
            match self.stock.get(line.product_id).await {
                Ok(product) => product,
                Err(e) => {
                    return Err(self
                        .unwind(&mut saga, STEP_RELEASE_STOCK, e, None, started)
                        .await);
                }
            }
        };

        tracing::info!(step = STEP_DELETE_LINE, "saga step started");
        match self.order_lines.delete_pending(order_line_id, user_id).await {
            Ok(_) => {
                saga.step_completed(STEP_DELETE_LINE);
                saga.complete()?;
                record_completed(&saga, started);
                Ok(CartItemRemoved {
                    order_line_id,
                    released: reserved,
                    product,
                    saga,
                })
            }
            Err(e) => {
                let undo = (reserved > 0).then(|| StockUndo {
                    step: STEP_RELEASE_STOCK,
                    product_id: line.product_id,
                    delta: -reserved,
                });
                Err(self
                    .unwind(&mut saga, STEP_DELETE_LINE, e, undo, started)
                    .await)
            }
        }
    }

    /// Compensates the completed stock step, if any, and builds the error
    /// returned to the caller.
    async fn unwind(
        &self,
        saga: &mut SagaInstance,
        failed_step: &'static str,
        source: DomainError,
        undo: Option<StockUndo>,
        started: Instant,
    ) -> SagaError {
        if let Err(e) = saga.begin_compensation(failed_step, source.to_string()) {
            return e;
        }
        tracing::warn!(
            saga_id = %saga.id(),
            step = failed_step,
            error = %source,
            "saga step failed, compensating"
        );

        if let Some(undo) = undo {
            match self.stock.adjust_stock(undo.product_id, undo.delta).await {
                Ok(_) => saga.step_compensated(undo.step),
                Err(e) => {
                    metrics::counter!("cart_saga_compensation_failures_total").increment(1);
                    metrics::histogram!("cart_saga_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    tracing::error!(
                        saga_id = %saga.id(),
                        step = undo.step,
                        product_id = %undo.product_id,
                        delta = undo.delta,
                        error = %e,
                        "compensation failed, stock needs manual reconciliation"
                    );
                    return SagaError::CompensationFailed {
                        saga_id: saga.id(),
                        step: undo.step,
                        reason: e.to_string(),
                    };
                }
            }
        }

        if let Err(e) = saga.fail() {
            return e;
        }
        metrics::counter!("cart_saga_failed_total", "kind" => saga.kind().as_str()).increment(1);
        metrics::histogram!("cart_saga_duration_seconds").record(started.elapsed().as_secs_f64());

        SagaError::StepFailed {
            saga_id: saga.id(),
            step: failed_step,
            source,
        }
    }
}

fn record_completed(saga: &SagaInstance, started: Instant) {
    let duration = started.elapsed().as_secs_f64();
    metrics::histogram!("cart_saga_duration_seconds").record(duration);
    metrics::counter!("cart_saga_completed_total", "kind" => saga.kind().as_str()).increment(1);
    tracing::info!(saga_id = %saga.id(), duration, "saga completed successfully");
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use store::{InMemoryStore, NewProduct, OrderLineStore, ProductStore};

    use super::*;
    use crate::state::SagaState;

    async fn setup(stock: i64) -> (CartCoordinator<InMemoryStore>, InMemoryStore, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Ron Blanco", Decimal::from(7990)))
            .await
            .unwrap();
        store
            .seed_product_stock(product.id, stock, ProductState::Available)
            .await
            .unwrap();
        (CartCoordinator::new(store.clone()), store, product.id)
    }

    fn add(product_id: ProductId, quantity: i64) -> AddToCart {
        AddToCart {
            user_id: UserId::new(7),
            product_id,
            quantity,
            ..Default::default()
        }
    }

    async fn stock_of(store: &InMemoryStore, id: ProductId) -> i64 {
        store.get_product(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn add_item_reserves_and_prices_the_line() {
        let (coordinator, store, product_id) = setup(5).await;

        let added = coordinator.add_item(add(product_id, 2)).await.unwrap();
        assert_eq!(added.saga.state(), SagaState::Completed);
        assert_eq!(added.line.unit_price, Decimal::from(7990));
        assert_eq!(added.line.subtotal, Decimal::from(15980));
        assert_eq!(added.line.user_id, Some(UserId::new(7)));
        assert_eq!(added.product.stock, 3);
        assert_eq!(stock_of(&store, product_id).await, 3);
    }

    #[tokio::test]
    async fn add_item_without_stock_writes_nothing() {
        let (coordinator, store, product_id) = setup(1).await;

        let err = coordinator.add_item(add(product_id, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::StepFailed {
                step: STEP_RESERVE_STOCK,
                source: DomainError::InsufficientStock { .. },
                ..
            }
        ));
        assert_eq!(stock_of(&store, product_id).await, 1);
        assert_eq!(store.order_line_count().await, 0);
    }

    #[tokio::test]
    async fn failed_insert_restores_stock() {
        let (coordinator, store, product_id) = setup(5).await;
        store.set_fail_on_order_line_insert(true);

        let err = coordinator.add_item(add(product_id, 2)).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::StepFailed {
                step: STEP_INSERT_LINE,
                ..
            }
        ));
        assert_eq!(stock_of(&store, product_id).await, 5);
        assert_eq!(store.order_line_count().await, 0);
    }

    #[tokio::test]
    async fn unavailable_product_is_refused_before_the_saga() {
        let (coordinator, store, product_id) = setup(5).await;
        store
            .seed_product_stock(product_id, 5, ProductState::Inactive)
            .await
            .unwrap();

        let err = coordinator.add_item(add(product_id, 1)).await.unwrap_err();
        assert!(matches!(
            err,
            SagaError::Domain(DomainError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn remove_item_returns_stock() {
        let (coordinator, store, product_id) = setup(5).await;
        let added = coordinator.add_item(add(product_id, 2)).await.unwrap();

        let removed = coordinator
            .remove_item(UserId::new(7), added.line.id)
            .await
            .unwrap();
        assert_eq!(removed.saga.state(), SagaState::Completed);
        assert_eq!(removed.released, 2);
        assert_eq!(removed.product.stock, 5);
        assert!(store.get_order_line(added.line.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_delete_takes_stock_back() {
        let (coordinator, store, product_id) = setup(5).await;
        let added = coordinator.add_item(add(product_id, 2)).await.unwrap();
        store.set_fail_on_order_line_delete(true);

        let err = coordinator
            .remove_item(UserId::new(7), added.line.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::StepFailed {
                step: STEP_DELETE_LINE,
                ..
            }
        ));
        assert_eq!(stock_of(&store, product_id).await, 3);
        assert!(store.get_order_line(added.line.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn checkout_landing_before_the_delete_keeps_the_line() {
        let (coordinator, store, product_id) = setup(5).await;
        let added = coordinator.add_item(add(product_id, 3)).await.unwrap();
        store.set_confirm_before_pending_delete(true);

        let err = coordinator
            .remove_item(UserId::new(7), added.line.id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SagaError::StepFailed {
                step: STEP_DELETE_LINE,
                source: DomainError::NoLongerPending(_),
                ..
            }
        ));
        assert_eq!(stock_of(&store, product_id).await, 2);
        let kept = store.get_order_line(added.line.id).await.unwrap().unwrap();
        assert_eq!(kept.state, OrderLineState::Confirmed);
    }

    #[tokio::test]
    async fn line_without_reservation_leaves_stock_alone() {
        let (coordinator, store, product_id) = setup(5).await;
        let line = store
            .insert_order_line(
                store::NewOrderLine::new(product_id, 3, Decimal::from(7990))
                    .owned_by(UserId::new(7)),
            )
            .await
            .unwrap();

        let removed = coordinator
            .remove_item(UserId::new(7), line.id)
            .await
            .unwrap();
        assert_eq!(removed.released, 0);
        assert_eq!(removed.product.stock, 5);
        assert_eq!(stock_of(&store, product_id).await, 5);
        assert_eq!(store.order_line_count().await, 0);
    }

    #[tokio::test]
    async fn other_users_cannot_remove_a_line() {
        let (coordinator, store, product_id) = setup(5).await;
        let added = coordinator.add_item(add(product_id, 2)).await.unwrap();

        let err = coordinator
            .remove_item(UserId::new(8), added.line.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Domain(DomainError::NotFound { .. })));
        assert_eq!(stock_of(&store, product_id).await, 3);
    }
}

//! Order line repository: validated CRUD over cart and order rows.

use chrono::{DateTime, Utc};
use common::{OrderLineId, OrderLineState, ProductId, UserId};
use rust_decimal::Decimal;
use store::{NewOrderLine, OrderLine, OrderLinePatch, Store};

use crate::{DomainError, Result, validation};

/// Fields accepted when creating an order line.
#[derive(Debug, Clone, Default)]
pub struct CreateOrderLine {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub subtotal: Option<Decimal>,
    pub user_id: Option<UserId>,
    pub seller_id: Option<UserId>,
    pub paid_at: Option<DateTime<Utc>>,
    pub state: Option<OrderLineState>,
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub customer_phone: Option<String>,
    pub document: Option<String>,
}

fn check_user(field: &'static str, user: Option<UserId>) -> Result<()> {
    if let Some(user) = user {
        validation::positive_id(field, user.as_i64())?;
    }
    Ok(())
}

fn check_patch(patch: &OrderLinePatch) -> Result<()> {
    if patch.is_empty() {
        return Err(DomainError::NoFieldsToUpdate);
    }
    if let Some(product_id) = patch.product_id {
        validation::positive_id("product_id", product_id.as_i64())?;
    }
    if let Some(quantity) = patch.quantity {
        validation::positive_quantity("quantity", quantity)?;
    }
    if let Some(price) = patch.unit_price {
        validation::non_negative_amount("unit_price", price)?;
    }
    if let Some(subtotal) = patch.subtotal {
        validation::non_negative_amount("subtotal", subtotal)?;
    }
    if let Some(user) = patch.user_id {
        check_user("user_id", user)?;
    }
    if let Some(seller) = patch.seller_id {
        check_user("seller_id", seller)?;
    }
    Ok(())
}

/// Service for order line rows.
#[derive(Clone)]
pub struct OrderLineService<S: Store> {
    store: S,
}

impl<S: Store> OrderLineService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a line after validating every field. Stock is not touched.
    ///
    /// An unknown product fails with `ForeignKeyViolation` and nothing is
    /// written.
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, cmd: CreateOrderLine) -> Result<OrderLine> {
        self.insert(cmd, false).await
    }

    /// Creates a line whose whole quantity was already taken from stock.
    /// Removing it from the cart gives that quantity back.
    #[tracing::instrument(skip(self))]
    pub async fn create_reserved(&self, cmd: CreateOrderLine) -> Result<OrderLine> {
        self.insert(cmd, true).await
    }

    async fn insert(&self, cmd: CreateOrderLine, reserved: bool) -> Result<OrderLine> {
        validation::positive_id("product_id", cmd.product_id.as_i64())?;
        validation::positive_quantity("quantity", cmd.quantity)?;
        validation::non_negative_amount("unit_price", cmd.unit_price)?;
        if let Some(subtotal) = cmd.subtotal {
            validation::non_negative_amount("subtotal", subtotal)?;
        }
        check_user("user_id", cmd.user_id)?;
        check_user("seller_id", cmd.seller_id)?;

        let line = self
            .store
            .insert_order_line(NewOrderLine {
                product_id: cmd.product_id,
                quantity: cmd.quantity,
                reserved_quantity: if reserved { cmd.quantity } else { 0 },
                unit_price: cmd.unit_price,
                subtotal: cmd.subtotal,
                user_id: cmd.user_id,
                seller_id: cmd.seller_id,
                paid_at: cmd.paid_at,
                state: cmd.state.unwrap_or_default(),
                customer_name: validation::optional_text(cmd.customer_name),
                customer_address: validation::optional_text(cmd.customer_address),
                customer_phone: validation::optional_text(cmd.customer_phone),
                document: validation::optional_text(cmd.document),
            })
            .await?;

        tracing::info!(order_line_id = %line.id, "Order line created");
        Ok(line)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderLineId) -> Result<OrderLine> {
        self.store
            .get_order_line(id)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "order line",
                id: id.as_i64(),
            })
    }

    /// Applies a partial update. Quantity or price changes recompute the
    /// subtotal unless one is supplied.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, id: OrderLineId, patch: OrderLinePatch) -> Result<OrderLine> {
        check_patch(&patch)?;

        self.store
            .update_order_line(id, patch)
            .await?
            .ok_or(DomainError::NotFound {
                entity: "order line",
                id: id.as_i64(),
            })
    }

    /// Deletes a line and returns its id.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderLineId) -> Result<OrderLineId> {
        if self.store.delete_order_line(id).await? {
            Ok(id)
        } else {
            Err(DomainError::NotFound {
                entity: "order line",
                id: id.as_i64(),
            })
        }
    }

    /// Deletes the user's line only if it is still pending at the moment of
    /// the write. Fails with `NoLongerPending` when a checkout or another
    /// removal got there first.
    #[tracing::instrument(skip(self))]
    pub async fn delete_pending(&self, id: OrderLineId, user_id: UserId) -> Result<OrderLineId> {
        if self.store.delete_pending_order_line(id, user_id).await? {
            Ok(id)
        } else {
            Err(DomainError::NoLongerPending(id))
        }
    }

    pub async fn list_all(&self) -> Result<Vec<OrderLine>> {
        Ok(self.store.list_order_lines().await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<OrderLine>> {
        validation::positive_id("user_id", user_id.as_i64())?;
        Ok(self.store.list_order_lines_for_user(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use common::ProductState;
    use store::{InMemoryStore, NewProduct, ProductStore};

    use super::*;

    async fn service_with_product() -> (OrderLineService<InMemoryStore>, ProductId) {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Espumante Brut", Decimal::from(5490)))
            .await
            .unwrap();
        store
            .seed_product_stock(product.id, 10, ProductState::Available)
            .await
            .unwrap();
        (OrderLineService::new(store), product.id)
    }

    fn line_for(product_id: ProductId) -> CreateOrderLine {
        CreateOrderLine {
            product_id,
            quantity: 2,
            unit_price: Decimal::from(5490),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_defaults_subtotal_and_state() {
        let (service, product_id) = service_with_product().await;
        let line = service.create(line_for(product_id)).await.unwrap();

        assert_eq!(line.subtotal, Decimal::from(10980));
        assert_eq!(line.state, OrderLineState::Pending);
        assert_eq!(service.get(line.id).await.unwrap(), line);
    }

    #[tokio::test]
    async fn only_cart_lines_carry_a_reservation() {
        let (service, product_id) = service_with_product().await;

        let direct = service.create(line_for(product_id)).await.unwrap();
        assert_eq!(direct.reserved_quantity, 0);

        let reserved = service.create_reserved(line_for(product_id)).await.unwrap();
        assert_eq!(reserved.reserved_quantity, 2);
    }

    #[tokio::test]
    async fn delete_pending_refuses_confirmed_lines() {
        let (service, product_id) = service_with_product().await;
        let user = UserId::new(5);
        let mut mine = line_for(product_id);
        mine.user_id = Some(user);
        let pending = service.create(mine.clone()).await.unwrap();
        mine.state = Some(OrderLineState::Confirmed);
        let confirmed = service.create(mine).await.unwrap();

        assert!(matches!(
            service.delete_pending(confirmed.id, user).await,
            Err(DomainError::NoLongerPending(id)) if id == confirmed.id
        ));
        assert!(matches!(
            service.delete_pending(pending.id, UserId::new(6)).await,
            Err(DomainError::NoLongerPending(_))
        ));
        assert_eq!(service.delete_pending(pending.id, user).await.unwrap(), pending.id);
        assert_eq!(service.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_invalid_fields() {
        let (service, product_id) = service_with_product().await;

        let mut zero_quantity = line_for(product_id);
        zero_quantity.quantity = 0;
        assert!(matches!(
            service.create(zero_quantity).await,
            Err(DomainError::Validation {
                field: "quantity",
                ..
            })
        ));

        let mut bad_user = line_for(product_id);
        bad_user.user_id = Some(UserId::new(-3));
        assert!(matches!(
            service.create(bad_user).await,
            Err(DomainError::Validation {
                field: "user_id",
                ..
            })
        ));

        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_product_creates_nothing() {
        let (service, _) = service_with_product().await;
        let err = service
            .create(line_for(ProductId::new(999)))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::ForeignKeyViolation { .. }));
        assert!(service.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let (service, product_id) = service_with_product().await;
        let line = service.create(line_for(product_id)).await.unwrap();

        let err = service
            .update(line.id, OrderLinePatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NoFieldsToUpdate));
    }

    #[tokio::test]
    async fn update_round_trip() {
        let (service, product_id) = service_with_product().await;
        let line = service.create(line_for(product_id)).await.unwrap();

        let updated = service
            .update(
                line.id,
                OrderLinePatch {
                    unit_price: Some(Decimal::from(5000)),
                    customer_phone: Some(Some("+56 9 1234 5678".into())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.subtotal, Decimal::from(10000));
        assert_eq!(updated.customer_phone.as_deref(), Some("+56 9 1234 5678"));

        assert_eq!(service.delete(line.id).await.unwrap(), line.id);
        assert!(matches!(
            service.get(line.id).await,
            Err(DomainError::NotFound { .. })
        ));
        assert!(matches!(
            service.delete(line.id).await,
            Err(DomainError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn update_missing_line() {
        let (service, _) = service_with_product().await;
        let err = service
            .update(
                OrderLineId::new(77),
                OrderLinePatch {
                    quantity: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { id: 77, .. }));
    }

    #[tokio::test]
    async fn list_by_user_filters() {
        let (service, product_id) = service_with_product().await;
        let mut mine = line_for(product_id);
        mine.user_id = Some(UserId::new(5));
        service.create(mine).await.unwrap();
        service.create(line_for(product_id)).await.unwrap();

        let lines = service.list_by_user(UserId::new(5)).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(service.list_all().await.unwrap().len(), 2);
        assert!(service.list_by_user(UserId::new(0)).await.is_err());
    }
}

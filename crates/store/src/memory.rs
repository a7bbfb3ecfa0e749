use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderLineState, ProductState, RequestState, UserId};
use tokio::sync::RwLock;

use crate::order_line::plan_confirmation;
use crate::supplier_request::merge_note;
use crate::{
    Confirmation, NewOrderLine, NewProduct, NewSupplierRequest, OrderLine, OrderLineId,
    OrderLinePatch, Product, ProductId, Resolution, ResolvedRequest, Result, StoreError,
    SupplierRequest, SupplierRequestId, SupplierRequestPatch,
    store::{OrderLineStore, ProductStore, SupplierRequestStore},
};

#[derive(Debug, Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    order_lines: BTreeMap<OrderLineId, OrderLine>,
    supplier_requests: BTreeMap<SupplierRequestId, SupplierRequest>,
    last_product_id: i64,
    last_order_line_id: i64,
    last_request_id: i64,
}

impl Tables {
    fn require_product(&self, id: ProductId) -> Result<()> {
        if self.products.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation {
                referenced: "product",
            })
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_on_order_line_insert: AtomicBool,
    fail_on_order_line_delete: AtomicBool,
    confirm_before_pending_delete: AtomicBool,
}

/// In-memory store implementation for testing and local runs.
///
/// Every table lives behind one lock, so each trait method is atomic with
/// respect to every other, matching the transactional guarantees of the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every order line insert fail until switched off again.
    pub fn set_fail_on_order_line_insert(&self, fail: bool) {
        self.faults
            .fail_on_order_line_insert
            .store(fail, Ordering::SeqCst);
    }

    /// Makes every order line delete fail until switched off again.
    pub fn set_fail_on_order_line_delete(&self, fail: bool) {
        self.faults
            .fail_on_order_line_delete
            .store(fail, Ordering::SeqCst);
    }

    /// Makes every guarded cart delete first confirm the line it targets, as
    /// a checkout committing between the cart's read and its delete would.
    pub fn set_confirm_before_pending_delete(&self, confirm: bool) {
        self.faults
            .confirm_before_pending_delete
            .store(confirm, Ordering::SeqCst);
    }

    /// Returns the number of order lines stored.
    pub async fn order_line_count(&self) -> usize {
        self.tables.read().await.order_lines.len()
    }

    /// Overwrites a product's stock and state directly, bypassing the ledger
    /// rules. Meant for seeding fixtures.
    pub async fn seed_product_stock(
        &self,
        id: ProductId,
        stock: i64,
        state: ProductState,
    ) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::product_not_found(id))?;
        product.stock = stock;
        product.state = state;
        Ok(product.clone())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let mut tables = self.tables.write().await;
        tables.last_product_id += 1;
        let product = Product {
            id: ProductId::new(tables.last_product_id),
            name: new.name,
            category: new.category,
            unit_price: new.unit_price,
            stock: 0,
            state: ProductState::New,
            pending_restock: false,
            supplier_id: new.supplier_id,
            created_at: Utc::now(),
        };
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.tables.read().await.products.values().cloned().collect())
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::product_not_found(id))?;

        match product.stock.checked_add(delta) {
            Some(next) if next >= 0 => {
                product.stock = next;
                Ok(product.clone())
            }
            Some(_) => Err(StoreError::InsufficientStock {
                product_id: id,
                available: product.stock,
                delta,
            }),
            None => Err(StoreError::StockOutOfRange {
                product_id: id,
                delta,
            }),
        }
    }

    async fn reserve_stock(&self, id: ProductId, quantity: i64) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::product_not_found(id))?;

        if product.state != ProductState::Available {
            return Err(StoreError::Unavailable {
                product_id: id,
                state: product.state,
            });
        }
        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                available: product.stock,
                delta: -quantity,
            });
        }
        product.stock -= quantity;
        Ok(product.clone())
    }

    async fn compare_and_set_product_state(
        &self,
        id: ProductId,
        expected: &[ProductState],
        new_state: ProductState,
    ) -> Result<Option<Product>> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(&id) {
            Some(product) if expected.contains(&product.state) => {
                product.state = new_state;
                Ok(Some(product.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn set_pending_restock(&self, id: ProductId, pending: bool) -> Result<Product> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| StoreError::product_not_found(id))?;
        product.pending_restock = pending;
        Ok(product.clone())
    }
}

#[async_trait]
impl OrderLineStore for InMemoryStore {
    async fn insert_order_line(&self, new: NewOrderLine) -> Result<OrderLine> {
        if self.faults.fail_on_order_line_insert.load(Ordering::SeqCst) {
            return Err(StoreError::InjectedFailure("order line insert"));
        }

        let mut tables = self.tables.write().await;
        tables.require_product(new.product_id)?;

        tables.last_order_line_id += 1;
        let subtotal = new.effective_subtotal();
        let line = OrderLine {
            id: OrderLineId::new(tables.last_order_line_id),
            product_id: new.product_id,
            quantity: new.quantity,
            reserved_quantity: new.reserved_quantity,
            unit_price: new.unit_price,
            subtotal,
            user_id: new.user_id,
            seller_id: new.seller_id,
            paid_at: new.paid_at,
            state: new.state,
            customer_name: new.customer_name,
            customer_address: new.customer_address,
            customer_phone: new.customer_phone,
            document: new.document,
            created_at: Utc::now(),
        };
        tables.order_lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn get_order_line(&self, id: OrderLineId) -> Result<Option<OrderLine>> {
        Ok(self.tables.read().await.order_lines.get(&id).cloned())
    }

    async fn update_order_line(
        &self,
        id: OrderLineId,
        patch: OrderLinePatch,
    ) -> Result<Option<OrderLine>> {
        let mut tables = self.tables.write().await;
        if let Some(product_id) = patch.product_id {
            tables.require_product(product_id)?;
        }

        match tables.order_lines.get_mut(&id) {
            Some(line) => {
                patch.apply_to(line);
                Ok(Some(line.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_order_line(&self, id: OrderLineId) -> Result<bool> {
        if self.faults.fail_on_order_line_delete.load(Ordering::SeqCst) {
            return Err(StoreError::InjectedFailure("order line delete"));
        }
        Ok(self.tables.write().await.order_lines.remove(&id).is_some())
    }

    async fn delete_pending_order_line(&self, id: OrderLineId, user_id: UserId) -> Result<bool> {
        if self.faults.fail_on_order_line_delete.load(Ordering::SeqCst) {
            return Err(StoreError::InjectedFailure("order line delete"));
        }

        let mut tables = self.tables.write().await;
        if self.faults.confirm_before_pending_delete.load(Ordering::SeqCst)
            && let Some(line) = tables.order_lines.get_mut(&id)
        {
            line.state = OrderLineState::Confirmed;
            line.paid_at = Some(Utc::now());
        }

        let removable = tables
            .order_lines
            .get(&id)
            .is_some_and(|line| line.user_id == Some(user_id) && line.state.is_pending());
        if removable {
            tables.order_lines.remove(&id);
        }
        Ok(removable)
    }

    async fn list_order_lines(&self) -> Result<Vec<OrderLine>> {
        let tables = self.tables.read().await;
        Ok(tables.order_lines.values().rev().cloned().collect())
    }

    async fn list_order_lines_for_user(&self, user_id: UserId) -> Result<Vec<OrderLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .order_lines
            .values()
            .rev()
            .filter(|line| line.user_id == Some(user_id))
            .cloned()
            .collect())
    }

    async fn claim_unowned_order_lines(&self, document: &str, user_id: UserId) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut claimed = 0;
        for line in tables.order_lines.values_mut() {
            if line.document.as_deref() == Some(document) && line.is_unclaimed() {
                line.user_id = Some(user_id);
                claimed += 1;
            }
        }
        Ok(claimed)
    }

    async fn confirm_order_lines(
        &self,
        user_id: UserId,
        ids: &[OrderLineId],
    ) -> Result<Confirmation> {
        let mut tables = self.tables.write().await;

        let current: Vec<_> = ids
            .iter()
            .filter_map(|id| tables.order_lines.get(id))
            .map(|line| (line.id, line.user_id, line.state.clone()))
            .collect();
        let plan = plan_confirmation(ids, &current, user_id);

        if !plan.rejected.is_empty() {
            return Ok(Confirmation::Rejected(plan.rejected));
        }

        let now = Utc::now();
        let mut confirmed = Vec::with_capacity(plan.to_confirm.len());
        for id in &plan.to_confirm {
            if let Some(line) = tables.order_lines.get_mut(id) {
                line.state = OrderLineState::Confirmed;
                line.paid_at = Some(now);
                confirmed.push(line.clone());
            }
        }

        Ok(Confirmation::Confirmed {
            confirmed,
            already_confirmed: plan.already_confirmed,
        })
    }
}

#[async_trait]
impl SupplierRequestStore for InMemoryStore {
    async fn insert_supplier_request(&self, new: NewSupplierRequest) -> Result<SupplierRequest> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&new.product_id)
            .ok_or(StoreError::ForeignKeyViolation {
                referenced: "product",
            })?;
        product.pending_restock = true;

        tables.last_request_id += 1;
        let request = SupplierRequest {
            id: SupplierRequestId::new(tables.last_request_id),
            product_id: new.product_id,
            quantity: new.quantity,
            state: RequestState::Pending,
            description: new.description,
            created_at: Utc::now(),
            resolved_at: None,
        };
        tables.supplier_requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_supplier_request(&self, id: SupplierRequestId) -> Result<Option<SupplierRequest>> {
        Ok(self.tables.read().await.supplier_requests.get(&id).cloned())
    }

    async fn list_supplier_requests(&self) -> Result<Vec<SupplierRequest>> {
        let tables = self.tables.read().await;
        let mut requests: Vec<_> = tables.supplier_requests.values().cloned().collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn update_pending_supplier_request(
        &self,
        id: SupplierRequestId,
        patch: SupplierRequestPatch,
    ) -> Result<Option<SupplierRequest>> {
        let mut tables = self.tables.write().await;
        if let Some(product_id) = patch.product_id {
            tables.require_product(product_id)?;
        }

        match tables.supplier_requests.get_mut(&id) {
            Some(request) if request.state.is_pending() => {
                patch.apply_to(request);
                Ok(Some(request.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_supplier_request(&self, id: SupplierRequestId) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .supplier_requests
            .remove(&id)
            .is_some())
    }

    async fn resolve_supplier_request(
        &self,
        id: SupplierRequestId,
        resolution: Resolution,
        note: Option<String>,
    ) -> Result<Option<ResolvedRequest>> {
        let mut guard = self.tables.write().await;
        let tables = &mut *guard;

        let Some(request) = tables
            .supplier_requests
            .get_mut(&id)
            .filter(|request| request.state.is_pending())
        else {
            return Ok(None);
        };

        // Check everything before the first write so a failure leaves the
        // request pending.
        let delta = match resolution {
            Resolution::Accept => request.quantity,
            Resolution::Reject => 0,
        };
        let product_id = request.product_id;
        let product = tables
            .products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::product_not_found(product_id))?;
        let next_stock = product
            .stock
            .checked_add(delta)
            .ok_or(StoreError::StockOutOfRange { product_id, delta })?;

        product.stock = next_stock;
        product.pending_restock = false;
        let product = product.clone();

        request.state = resolution.target_state();
        request.description = merge_note(request.description.as_deref(), note.as_deref());
        request.resolved_at = Some(Utc::now());

        Ok(Some(ResolvedRequest {
            request: request.clone(),
            product,
        }))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn pesos(amount: i64) -> Decimal {
        Decimal::from(amount)
    }

    async fn available_product(store: &InMemoryStore, stock: i64) -> Product {
        let product = store
            .insert_product(NewProduct::new("Pisco Reservado 35", pesos(6990)))
            .await
            .unwrap();
        store
            .seed_product_stock(product.id, stock, ProductState::Available)
            .await
            .unwrap()
    }

    async fn pending_request(
        store: &InMemoryStore,
        product_id: ProductId,
        quantity: i64,
    ) -> SupplierRequest {
        store
            .insert_supplier_request(NewSupplierRequest {
                product_id,
                quantity,
                description: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_product_starts_new_with_zero_stock() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Ron Añejo", pesos(8990)).with_category("Ron"))
            .await
            .unwrap();

        assert_eq!(product.id, ProductId::new(1));
        assert_eq!(product.stock, 0);
        assert_eq!(product.state, ProductState::New);
        assert!(!product.pending_restock);
    }

    #[tokio::test]
    async fn adjust_stock_rejects_negative_result() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 5).await;

        let result = store.adjust_stock(product.id, -6).await;
        assert!(matches!(
            result,
            Err(StoreError::InsufficientStock {
                available: 5,
                delta: -6,
                ..
            })
        ));

        let stored = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, 5);

        let drained = store.adjust_stock(product.id, -5).await.unwrap();
        assert_eq!(drained.stock, 0);
    }

    #[tokio::test]
    async fn adjust_stock_on_missing_product() {
        let store = InMemoryStore::new();
        let result = store.adjust_stock(ProductId::new(99), 1).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn compare_and_set_only_matches_expected_state() {
        let store = InMemoryStore::new();
        let product = store
            .insert_product(NewProduct::new("Vino Tinto", pesos(4500)))
            .await
            .unwrap();

        let miss = store
            .compare_and_set_product_state(
                product.id,
                &[ProductState::Available],
                ProductState::Inactive,
            )
            .await
            .unwrap();
        assert!(miss.is_none());

        let hit = store
            .compare_and_set_product_state(product.id, &[ProductState::New], ProductState::Available)
            .await
            .unwrap();
        assert_eq!(hit.unwrap().state, ProductState::Available);
    }

    #[tokio::test]
    async fn order_line_insert_requires_existing_product() {
        let store = InMemoryStore::new();
        let result = store
            .insert_order_line(NewOrderLine::new(ProductId::new(999), 1, pesos(1000)))
            .await;

        assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));
        assert_eq!(store.order_line_count().await, 0);
    }

    #[tokio::test]
    async fn order_lines_list_newest_first() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 10).await;
        for _ in 0..3 {
            store
                .insert_order_line(NewOrderLine::new(product.id, 1, pesos(6990)))
                .await
                .unwrap();
        }

        let ids: Vec<i64> = store
            .list_order_lines()
            .await
            .unwrap()
            .iter()
            .map(|l| l.id.as_i64())
            .collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn claim_unowned_is_idempotent() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 10).await;
        let user = UserId::new(7);

        for _ in 0..2 {
            store
                .insert_order_line(
                    NewOrderLine::new(product.id, 1, pesos(6990)).with_document("12345678"),
                )
                .await
                .unwrap();
        }
        // Already owned by someone else: must not be stolen.
        store
            .insert_order_line(
                NewOrderLine::new(product.id, 1, pesos(6990))
                    .with_document("12345678")
                    .owned_by(UserId::new(3)),
            )
            .await
            .unwrap();
        // Legacy zero owner counts as unclaimed.
        store
            .insert_order_line(
                NewOrderLine::new(product.id, 1, pesos(6990))
                    .with_document("12345678")
                    .owned_by(UserId::new(0)),
            )
            .await
            .unwrap();

        assert_eq!(store.claim_unowned_order_lines("12345678", user).await.unwrap(), 3);
        assert_eq!(store.claim_unowned_order_lines("12345678", user).await.unwrap(), 0);
        assert_eq!(store.list_order_lines_for_user(user).await.unwrap().len(), 3);
        assert_eq!(
            store
                .list_order_lines_for_user(UserId::new(3))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn confirm_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 10).await;
        let user = UserId::new(7);

        let mine = store
            .insert_order_line(NewOrderLine::new(product.id, 1, pesos(6990)).owned_by(user))
            .await
            .unwrap();
        let theirs = store
            .insert_order_line(
                NewOrderLine::new(product.id, 1, pesos(6990)).owned_by(UserId::new(8)),
            )
            .await
            .unwrap();

        let outcome = store
            .confirm_order_lines(user, &[mine.id, theirs.id])
            .await
            .unwrap();
        assert_eq!(outcome, Confirmation::Rejected(vec![theirs.id]));

        let untouched = store.get_order_line(mine.id).await.unwrap().unwrap();
        assert_eq!(untouched.state, OrderLineState::Pending);
        assert!(untouched.paid_at.is_none());

        let outcome = store.confirm_order_lines(user, &[mine.id]).await.unwrap();
        match outcome {
            Confirmation::Confirmed { confirmed, .. } => {
                assert_eq!(confirmed.len(), 1);
                assert_eq!(confirmed[0].state, OrderLineState::Confirmed);
                assert!(confirmed[0].paid_at.is_some());
            }
            other => panic!("expected confirmation, got {other:?}"),
        }

        let again = store.confirm_order_lines(user, &[mine.id]).await.unwrap();
        assert_eq!(
            again,
            Confirmation::Confirmed {
                confirmed: vec![],
                already_confirmed: vec![mine.id],
            }
        );
    }

    #[tokio::test]
    async fn resolve_accept_increases_stock_once() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 5).await;
        store.set_pending_restock(product.id, true).await.unwrap();
        let request = pending_request(&store, product.id, 20).await;

        let resolved = store
            .resolve_supplier_request(request.id, Resolution::Accept, Some("ok".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.request.state, RequestState::Accepted);
        assert_eq!(resolved.request.description.as_deref(), Some("ok"));
        assert!(resolved.request.resolved_at.is_some());
        assert_eq!(resolved.product.stock, 25);
        assert!(!resolved.product.pending_restock);

        let second = store
            .resolve_supplier_request(request.id, Resolution::Accept, None)
            .await
            .unwrap();
        assert!(second.is_none());
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 25);
    }

    #[tokio::test]
    async fn resolve_reject_leaves_stock_alone() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 5).await;
        store.set_pending_restock(product.id, true).await.unwrap();
        let request = store
            .insert_supplier_request(NewSupplierRequest {
                product_id: product.id,
                quantity: 12,
                description: Some("caja x12".into()),
            })
            .await
            .unwrap();

        let resolved = store
            .resolve_supplier_request(request.id, Resolution::Reject, Some("sin stock".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.request.state, RequestState::Rejected);
        assert_eq!(resolved.request.description.as_deref(), Some("caja x12"));
        assert_eq!(resolved.product.stock, 5);
        assert!(!resolved.product.pending_restock);
    }

    #[tokio::test]
    async fn concurrent_accepts_apply_once() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 5).await;
        let request_id = pending_request(&store, product.id, 20).await.id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let resolution = if i % 2 == 0 {
                Resolution::Accept
            } else {
                Resolution::Reject
            };
            handles.push(tokio::spawn(async move {
                store
                    .resolve_supplier_request(request_id, resolution, None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            if let Some(resolved) = handle.await.unwrap() {
                winners.push(resolved);
            }
        }
        assert_eq!(winners.len(), 1);

        let stock = store.get_product(product.id).await.unwrap().unwrap().stock;
        match winners[0].request.state {
            RequestState::Accepted => assert_eq!(stock, 25),
            RequestState::Rejected => assert_eq!(stock, 5),
            RequestState::Pending => panic!("winner left the request pending"),
        }
    }

    #[tokio::test]
    async fn update_pending_request_refuses_resolved_rows() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 0).await;
        let request = pending_request(&store, product.id, 6).await;

        let updated = store
            .update_pending_supplier_request(
                request.id,
                SupplierRequestPatch {
                    quantity: Some(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 10);

        store
            .resolve_supplier_request(request.id, Resolution::Reject, None)
            .await
            .unwrap();

        let refused = store
            .update_pending_supplier_request(
                request.id,
                SupplierRequestPatch {
                    quantity: Some(99),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(refused.is_none());
    }

    #[tokio::test]
    async fn injected_delete_failure() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 3).await;
        let line = store
            .insert_order_line(NewOrderLine::new(product.id, 1, pesos(6990)))
            .await
            .unwrap();

        store.set_fail_on_order_line_delete(true);
        assert!(matches!(
            store.delete_order_line(line.id).await,
            Err(StoreError::InjectedFailure(_))
        ));

        store.set_fail_on_order_line_delete(false);
        assert!(store.delete_order_line(line.id).await.unwrap());
        assert!(!store.delete_order_line(line.id).await.unwrap());
    }

    #[tokio::test]
    async fn adjust_stock_overflow_is_out_of_range() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 5).await;

        let result = store.adjust_stock(product.id, i64::MAX).await;
        assert!(matches!(
            result,
            Err(StoreError::StockOutOfRange { delta: i64::MAX, .. })
        ));
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn reserve_stock_requires_an_available_product() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 4).await;

        let reserved = store.reserve_stock(product.id, 3).await.unwrap();
        assert_eq!(reserved.stock, 1);

        let short = store.reserve_stock(product.id, 2).await;
        assert!(matches!(
            short,
            Err(StoreError::InsufficientStock {
                available: 1,
                delta: -2,
                ..
            })
        ));

        store
            .seed_product_stock(product.id, 10, ProductState::Inactive)
            .await
            .unwrap();
        let inactive = store.reserve_stock(product.id, 1).await;
        assert!(matches!(
            inactive,
            Err(StoreError::Unavailable {
                state: ProductState::Inactive,
                ..
            })
        ));
        assert_eq!(store.get_product(product.id).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn pending_delete_only_removes_the_owners_pending_line() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 10).await;
        let user = UserId::new(7);
        let pending = store
            .insert_order_line(NewOrderLine::new(product.id, 1, pesos(6990)).owned_by(user))
            .await
            .unwrap();
        let confirmed = store
            .insert_order_line(NewOrderLine::new(product.id, 1, pesos(6990)).owned_by(user))
            .await
            .unwrap();
        store.confirm_order_lines(user, &[confirmed.id]).await.unwrap();

        assert!(!store
            .delete_pending_order_line(pending.id, UserId::new(8))
            .await
            .unwrap());
        assert!(!store
            .delete_pending_order_line(confirmed.id, user)
            .await
            .unwrap());
        assert!(store.delete_pending_order_line(pending.id, user).await.unwrap());
        assert!(!store.delete_pending_order_line(pending.id, user).await.unwrap());

        let kept = store.get_order_line(confirmed.id).await.unwrap().unwrap();
        assert_eq!(kept.state, OrderLineState::Confirmed);
    }

    #[tokio::test]
    async fn confirm_switch_lands_a_checkout_before_the_pending_delete() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 10).await;
        let user = UserId::new(7);
        let line = store
            .insert_order_line(NewOrderLine::new(product.id, 2, pesos(6990)).owned_by(user))
            .await
            .unwrap();

        store.set_confirm_before_pending_delete(true);
        assert!(!store.delete_pending_order_line(line.id, user).await.unwrap());

        let stored = store.get_order_line(line.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderLineState::Confirmed);
        assert!(stored.paid_at.is_some());
    }

    #[tokio::test]
    async fn opening_a_request_flags_the_product() {
        let store = InMemoryStore::new();
        let product = available_product(&store, 0).await;

        let request = pending_request(&store, product.id, 6).await;
        assert_eq!(request.state, RequestState::Pending);
        assert!(store.get_product(product.id).await.unwrap().unwrap().pending_restock);
    }

    #[tokio::test]
    async fn request_for_missing_product_writes_nothing() {
        let store = InMemoryStore::new();
        let result = store
            .insert_supplier_request(NewSupplierRequest {
                product_id: ProductId::new(404),
                quantity: 6,
                description: None,
            })
            .await;

        assert!(matches!(result, Err(StoreError::ForeignKeyViolation { .. })));
        assert!(store.list_supplier_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overflowing_accept_leaves_the_request_pending() {
        let store = InMemoryStore::new();
        let product = available_product(&store, i64::MAX - 1).await;
        let request = pending_request(&store, product.id, 2).await;

        let result = store
            .resolve_supplier_request(request.id, Resolution::Accept, None)
            .await;
        assert!(matches!(result, Err(StoreError::StockOutOfRange { delta: 2, .. })));

        let stored = store.get_supplier_request(request.id).await.unwrap().unwrap();
        assert_eq!(stored.state, RequestState::Pending);
        let product = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, i64::MAX - 1);
        assert!(product.pending_restock);
    }
}

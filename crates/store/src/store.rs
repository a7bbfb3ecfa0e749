use async_trait::async_trait;
use common::{ProductState, UserId};

use crate::{
    Confirmation, NewOrderLine, NewProduct, NewSupplierRequest, OrderLine, OrderLineId,
    OrderLinePatch, Product, ProductId, Resolution, ResolvedRequest, Result, SupplierRequest,
    SupplierRequestId, SupplierRequestPatch,
};

/// Storage for the product stock ledger.
///
/// All implementations must be thread-safe (Send + Sync). Every method that
/// reads and writes in one go does so atomically.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a product with `state = New`, `stock = 0`, no pending restock.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Lists products ordered by id.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Applies `stock += delta` as a single conditional update.
    ///
    /// Fails with `InsufficientStock` and leaves the row untouched if the
    /// result would be negative, `StockOutOfRange` if it would overflow,
    /// `NotFound` if the product does not exist.
    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product>;

    /// Takes `quantity` units out of stock in one conditional update that also
    /// requires the product to be `Available`.
    ///
    /// Fails with `Unavailable` or `InsufficientStock` and leaves the row
    /// untouched when either guard misses.
    async fn reserve_stock(&self, id: ProductId, quantity: i64) -> Result<Product>;

    /// Moves the product to `new_state` only if its current state is one of
    /// `expected`.
    ///
    /// Returns `None` when the guard did not match or the product is missing.
    async fn compare_and_set_product_state(
        &self,
        id: ProductId,
        expected: &[ProductState],
        new_state: ProductState,
    ) -> Result<Option<Product>>;

    async fn set_pending_restock(&self, id: ProductId, pending: bool) -> Result<Product>;
}

/// Storage for order lines.
#[async_trait]
pub trait OrderLineStore: Send + Sync {
    /// Inserts an order line. An unknown product fails with
    /// `ForeignKeyViolation` and nothing is written.
    async fn insert_order_line(&self, line: NewOrderLine) -> Result<OrderLine>;

    async fn get_order_line(&self, id: OrderLineId) -> Result<Option<OrderLine>>;

    /// Applies a partial update. Returns `None` if the line does not exist.
    async fn update_order_line(
        &self,
        id: OrderLineId,
        patch: OrderLinePatch,
    ) -> Result<Option<OrderLine>>;

    /// Returns false if the line did not exist.
    async fn delete_order_line(&self, id: OrderLineId) -> Result<bool>;

    /// Deletes the line only while it is still pending and owned by
    /// `user_id`, as one conditional delete.
    ///
    /// Returns false when no row matched, for instance because a checkout
    /// confirmed the line first.
    async fn delete_pending_order_line(&self, id: OrderLineId, user_id: UserId) -> Result<bool>;

    /// Lists every line, newest id first.
    async fn list_order_lines(&self) -> Result<Vec<OrderLine>>;

    /// Lists the lines owned by `user_id`, newest id first.
    async fn list_order_lines_for_user(&self, user_id: UserId) -> Result<Vec<OrderLine>>;

    /// Assigns every unclaimed line carrying `document` to `user_id`.
    ///
    /// A single bulk conditional update; returns the number of rows claimed.
    async fn claim_unowned_order_lines(&self, document: &str, user_id: UserId) -> Result<u64>;

    /// Confirms the given lines for `user_id` all-or-nothing.
    async fn confirm_order_lines(
        &self,
        user_id: UserId,
        ids: &[OrderLineId],
    ) -> Result<Confirmation>;
}

/// Storage for supplier replenishment requests.
#[async_trait]
pub trait SupplierRequestStore: Send + Sync {
    /// Inserts a pending request and flags its product as awaiting restock,
    /// atomically. An unknown product fails with `ForeignKeyViolation` and
    /// nothing is written.
    async fn insert_supplier_request(&self, request: NewSupplierRequest)
    -> Result<SupplierRequest>;

    async fn get_supplier_request(&self, id: SupplierRequestId)
    -> Result<Option<SupplierRequest>>;

    /// Lists requests, most recently created first.
    async fn list_supplier_requests(&self) -> Result<Vec<SupplierRequest>>;

    /// Updates a request while it is still pending.
    ///
    /// Returns `None` if it does not exist or has already been resolved.
    async fn update_pending_supplier_request(
        &self,
        id: SupplierRequestId,
        patch: SupplierRequestPatch,
    ) -> Result<Option<SupplierRequest>>;

    async fn delete_supplier_request(&self, id: SupplierRequestId) -> Result<bool>;

    /// Claims exactly one pending request and resolves it atomically.
    ///
    /// On accept the product's stock grows by the request quantity. Both
    /// outcomes clear the product's pending-restock flag and keep the
    /// existing description unless it is blank. Returns `None` if there is no
    /// pending request with this id; concurrent callers racing on the same id
    /// see exactly one `Some`.
    async fn resolve_supplier_request(
        &self,
        id: SupplierRequestId,
        resolution: Resolution,
        note: Option<String>,
    ) -> Result<Option<ResolvedRequest>>;
}

/// Everything the services need from one storage handle.
pub trait Store: ProductStore + OrderLineStore + SupplierRequestStore + Clone + 'static {}

impl<T> Store for T where T: ProductStore + OrderLineStore + SupplierRequestStore + Clone + 'static {}

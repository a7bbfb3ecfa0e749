use async_trait::async_trait;
use common::{OrderLineState, ProductState, RequestState, UserId};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::order_line::plan_confirmation;
use crate::{
    Confirmation, NewOrderLine, NewProduct, NewSupplierRequest, OrderLine, OrderLineId,
    OrderLinePatch, Product, ProductId, Resolution, ResolvedRequest, Result, StoreError,
    SupplierRequest, SupplierRequestId, SupplierRequestPatch,
    store::{OrderLineStore, ProductStore, SupplierRequestStore},
};

const PRODUCT_COLUMNS: &str =
    "id, name, category, unit_price, stock, state, pending_restock, supplier_id, created_at";

const ORDER_LINE_COLUMNS: &str = "id, product_id, quantity, reserved_quantity, unit_price, \
     subtotal, user_id, seller_id, paid_at, state, customer_name, customer_address, \
     customer_phone, document, created_at";

const REQUEST_COLUMNS: &str =
    "id, product_id, quantity, state, description, created_at, resolved_at";

/// SQLSTATE `numeric_value_out_of_range`, raised when `stock + delta`
/// overflows BIGINT.
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

fn stock_error(err: sqlx::Error, product_id: ProductId, delta: i64) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.code().as_deref() == Some(NUMERIC_VALUE_OUT_OF_RANGE)
    {
        return StoreError::StockOutOfRange { product_id, delta };
    }
    StoreError::from(err)
}

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store over an open pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool of at most `max_connections` connections.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Closes every pooled connection. Called once at shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let state: String = row.try_get("state")?;
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            unit_price: row.try_get("unit_price")?,
            stock: row.try_get("stock")?,
            state: state
                .parse::<ProductState>()
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            pending_restock: row.try_get("pending_restock")?,
            supplier_id: row.try_get::<Option<i64>, _>("supplier_id")?.map(UserId::new),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
        Ok(OrderLine {
            id: OrderLineId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            reserved_quantity: row.try_get("reserved_quantity")?,
            unit_price: row.try_get("unit_price")?,
            subtotal: row.try_get("subtotal")?,
            user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
            seller_id: row.try_get::<Option<i64>, _>("seller_id")?.map(UserId::new),
            paid_at: row.try_get("paid_at")?,
            state: OrderLineState::from(row.try_get::<String, _>("state")?),
            customer_name: row.try_get("customer_name")?,
            customer_address: row.try_get("customer_address")?,
            customer_phone: row.try_get("customer_phone")?,
            document: row.try_get("document")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_request(row: PgRow) -> Result<SupplierRequest> {
        let state: String = row.try_get("state")?;
        Ok(SupplierRequest {
            id: SupplierRequestId::new(row.try_get("id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: row.try_get("quantity")?,
            state: state
                .parse::<RequestState>()
                .map_err(|e| StoreError::Decode(e.to_string()))?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, new: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            "INSERT INTO products (name, category, unit_price, supplier_id) \
             VALUES ($1, $2, $3, $4) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.category)
        .bind(new.unit_price)
        .bind(new.supplier_id.map(i64::from))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET stock = stock + $2 \
             WHERE id = $1 AND stock + $2 >= 0 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| stock_error(e, id, delta))?;

        if let Some(row) = row {
            return Self::row_to_product(row);
        }

        // Guard missed: tell a missing product apart from a short one.
        let available: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: id,
                available,
                delta,
            }),
            None => Err(StoreError::product_not_found(id)),
        }
    }

    async fn reserve_stock(&self, id: ProductId, quantity: i64) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET stock = stock - $2 \
             WHERE id = $1 AND state = $3 AND stock - $2 >= 0 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(quantity)
        .bind(ProductState::Available.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| stock_error(e, id, -quantity))?;

        if let Some(row) = row {
            return Self::row_to_product(row);
        }

        // A guard missed: report which one.
        match self.get_product(id).await? {
            Some(product) if product.state != ProductState::Available => {
                Err(StoreError::Unavailable {
                    product_id: id,
                    state: product.state,
                })
            }
            Some(product) => Err(StoreError::InsufficientStock {
                product_id: id,
                available: product.stock,
                delta: -quantity,
            }),
            None => Err(StoreError::product_not_found(id)),
        }
    }

    async fn compare_and_set_product_state(
        &self,
        id: ProductId,
        expected: &[ProductState],
        new_state: ProductState,
    ) -> Result<Option<Product>> {
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();

        let row = sqlx::query(&format!(
            "UPDATE products SET state = $2 \
             WHERE id = $1 AND state = ANY($3) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(new_state.as_str())
        .bind(expected)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn set_pending_restock(&self, id: ProductId, pending: bool) -> Result<Product> {
        let row = sqlx::query(&format!(
            "UPDATE products SET pending_restock = $2 WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id.as_i64())
        .bind(pending)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::product_not_found(id)),
        }
    }
}

#[async_trait]
impl OrderLineStore for PostgresStore {
    async fn insert_order_line(&self, new: NewOrderLine) -> Result<OrderLine> {
        let subtotal = new.effective_subtotal();

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO order_lines (product_id, quantity, reserved_quantity, unit_price,
                subtotal, user_id, seller_id, paid_at, state, customer_name, customer_address,
                customer_phone, document)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORDER_LINE_COLUMNS}
            "#
        ))
        .bind(new.product_id.as_i64())
        .bind(new.quantity)
        .bind(new.reserved_quantity)
        .bind(new.unit_price)
        .bind(subtotal)
        .bind(new.user_id.map(i64::from))
        .bind(new.seller_id.map(i64::from))
        .bind(new.paid_at)
        .bind(new.state.as_str())
        .bind(&new.customer_name)
        .bind(&new.customer_address)
        .bind(&new.customer_phone)
        .bind(&new.document)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order_line(row)
    }

    async fn get_order_line(&self, id: OrderLineId) -> Result<Option<OrderLine>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order_line).transpose()
    }

    async fn update_order_line(
        &self,
        id: OrderLineId,
        patch: OrderLinePatch,
    ) -> Result<Option<OrderLine>> {
        if patch.is_empty() {
            return self.get_order_line(id).await;
        }

        let recompute = patch.recomputes_subtotal();
        let OrderLinePatch {
            product_id,
            quantity,
            unit_price,
            subtotal,
            user_id,
            seller_id,
            paid_at,
            state,
            customer_name,
            customer_address,
            customer_phone,
            document,
        } = patch;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE order_lines SET ");
        {
            let mut set = qb.separated(", ");

            if let Some(v) = product_id {
                set.push("product_id = ").push_bind_unseparated(v.as_i64());
            }
            if let Some(v) = quantity {
                set.push("quantity = ").push_bind_unseparated(v);
            }
            if let Some(v) = unit_price {
                set.push("unit_price = ").push_bind_unseparated(v);
            }
            if let Some(v) = subtotal {
                set.push("subtotal = ").push_bind_unseparated(v);
            } else if recompute {
                // Right-hand sides see the pre-update row, so untouched
                // factors come from the current columns.
                set.push("subtotal = ");
                match quantity {
                    Some(q) => set.push_bind_unseparated(q),
                    None => set.push_unseparated("quantity"),
                };
                set.push_unseparated(" * ");
                match unit_price {
                    Some(p) => set.push_bind_unseparated(p),
                    None => set.push_unseparated("unit_price"),
                };
            }
            if let Some(v) = user_id {
                set.push("user_id = ")
                    .push_bind_unseparated(v.map(i64::from));
            }
            if let Some(v) = seller_id {
                set.push("seller_id = ")
                    .push_bind_unseparated(v.map(i64::from));
            }
            if let Some(v) = paid_at {
                set.push("paid_at = ").push_bind_unseparated(v);
            }
            if let Some(v) = state {
                set.push("state = ")
                    .push_bind_unseparated(String::from(v));
            }
            if let Some(v) = customer_name {
                set.push("customer_name = ").push_bind_unseparated(v);
            }
            if let Some(v) = customer_address {
                set.push("customer_address = ").push_bind_unseparated(v);
            }
            if let Some(v) = customer_phone {
                set.push("customer_phone = ").push_bind_unseparated(v);
            }
            if let Some(v) = document {
                set.push("document = ").push_bind_unseparated(v);
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id.as_i64())
            .push(" RETURNING ")
            .push(ORDER_LINE_COLUMNS);

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.map(Self::row_to_order_line).transpose()
    }

    async fn delete_order_line(&self, id: OrderLineId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM order_lines WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_pending_order_line(&self, id: OrderLineId, user_id: UserId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM order_lines WHERE id = $1 AND user_id = $2 AND state = $3")
                .bind(id.as_i64())
                .bind(user_id.as_i64())
                .bind(OrderLineState::Pending.as_str())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_order_lines(&self) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_line).collect()
    }

    async fn list_order_lines_for_user(&self, user_id: UserId) -> Result<Vec<OrderLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE user_id = $1 ORDER BY id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order_line).collect()
    }

    async fn claim_unowned_order_lines(&self, document: &str, user_id: UserId) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE order_lines SET user_id = $2
            WHERE document = $1 AND (user_id IS NULL OR user_id = 0)
            "#,
        )
        .bind(document)
        .bind(user_id.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn confirm_order_lines(
        &self,
        user_id: UserId,
        ids: &[OrderLineId],
    ) -> Result<Confirmation> {
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.as_i64()).collect();

        let mut tx = self.pool.begin().await?;

        // Lock the rows so the plan and the update see the same states. A
        // cart removal blocked on one of them re-reads `state` after commit
        // and deletes nothing.
        let rows = sqlx::query(
            "SELECT id, user_id, state FROM order_lines WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&raw_ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut current = Vec::with_capacity(rows.len());
        for row in rows {
            current.push((
                OrderLineId::new(row.try_get("id")?),
                row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
                OrderLineState::from(row.try_get::<String, _>("state")?),
            ));
        }

        let plan = plan_confirmation(ids, &current, user_id);
        if !plan.rejected.is_empty() {
            tx.rollback().await?;
            return Ok(Confirmation::Rejected(plan.rejected));
        }

        let mut confirmed = Vec::with_capacity(plan.to_confirm.len());
        if !plan.to_confirm.is_empty() {
            let to_confirm: Vec<i64> = plan.to_confirm.iter().map(|id| id.as_i64()).collect();
            let rows = sqlx::query(&format!(
                "UPDATE order_lines SET state = $2, paid_at = NOW() \
                 WHERE id = ANY($1) RETURNING {ORDER_LINE_COLUMNS}"
            ))
            .bind(&to_confirm)
            .bind(OrderLineState::Confirmed.as_str())
            .fetch_all(&mut *tx)
            .await?;

            for row in rows {
                confirmed.push(Self::row_to_order_line(row)?);
            }
            confirmed.sort_by_key(|line| line.id);
        }

        tx.commit().await?;

        Ok(Confirmation::Confirmed {
            confirmed,
            already_confirmed: plan.already_confirmed,
        })
    }
}

#[async_trait]
impl SupplierRequestStore for PostgresStore {
    async fn insert_supplier_request(&self, new: NewSupplierRequest) -> Result<SupplierRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "INSERT INTO supplier_requests (product_id, quantity, description) \
             VALUES ($1, $2, $3) RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(new.product_id.as_i64())
        .bind(new.quantity)
        .bind(&new.description)
        .fetch_one(&mut *tx)
        .await?;
        let request = Self::row_to_request(row)?;

        sqlx::query("UPDATE products SET pending_restock = TRUE WHERE id = $1")
            .bind(request.product_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(request)
    }

    async fn get_supplier_request(&self, id: SupplierRequestId) -> Result<Option<SupplierRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM supplier_requests WHERE id = $1"
        ))
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_request).transpose()
    }

    async fn list_supplier_requests(&self) -> Result<Vec<SupplierRequest>> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM supplier_requests ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_request).collect()
    }

    async fn update_pending_supplier_request(
        &self,
        id: SupplierRequestId,
        patch: SupplierRequestPatch,
    ) -> Result<Option<SupplierRequest>> {
        if patch.is_empty() {
            return self.get_supplier_request(id).await;
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE supplier_requests SET ");
        {
            let mut set = qb.separated(", ");
            if let Some(v) = patch.product_id {
                set.push("product_id = ").push_bind_unseparated(v.as_i64());
            }
            if let Some(v) = patch.quantity {
                set.push("quantity = ").push_bind_unseparated(v);
            }
            if let Some(v) = patch.description {
                set.push("description = ").push_bind_unseparated(v);
            }
        }
        qb.push(" WHERE id = ")
            .push_bind(id.as_i64())
            .push(" AND state = ")
            .push_bind(RequestState::Pending.as_str())
            .push(" RETURNING ")
            .push(REQUEST_COLUMNS);

        let row = qb.build().fetch_optional(&self.pool).await?;
        row.map(Self::row_to_request).transpose()
    }

    async fn delete_supplier_request(&self, id: SupplierRequestId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM supplier_requests WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn resolve_supplier_request(
        &self,
        id: SupplierRequestId,
        resolution: Resolution,
        note: Option<String>,
    ) -> Result<Option<ResolvedRequest>> {
        let mut tx = self.pool.begin().await?;

        // Claim: only one transaction can move the row out of 'pending'. A
        // concurrent claimer blocks on the row lock and then matches nothing.
        let claimed = sqlx::query(&format!(
            r#"
            UPDATE supplier_requests
            SET state = $2,
                resolved_at = NOW(),
                description = CASE
                    WHEN description IS NULL OR btrim(description) = '' THEN $3
                    ELSE description
                END
            WHERE id = $1 AND state = 'pending'
            RETURNING {REQUEST_COLUMNS}
            "#
        ))
        .bind(id.as_i64())
        .bind(resolution.target_state().as_str())
        .bind(note)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = claimed else {
            tx.rollback().await?;
            return Ok(None);
        };
        let request = Self::row_to_request(row)?;

        let delta = match resolution {
            Resolution::Accept => request.quantity,
            Resolution::Reject => 0,
        };
        let product_row = sqlx::query(&format!(
            "UPDATE products SET stock = stock + $2, pending_restock = FALSE \
             WHERE id = $1 RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(request.product_id.as_i64())
        .bind(delta)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| stock_error(e, request.product_id, delta))?;

        let Some(product_row) = product_row else {
            tx.rollback().await?;
            return Err(StoreError::product_not_found(request.product_id));
        };
        let product = Self::row_to_product(product_row)?;

        tx.commit().await?;

        Ok(Some(ResolvedRequest { request, product }))
    }
}

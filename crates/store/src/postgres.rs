use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{
    CartId, CustomerId, GuestId, MovementId, OrderId, ProductId, StoreId, VariantId, Version,
};
use domain::{AggregateRoot, Cart, CartOwner, InventoryMovement, Order, Product, catalog::ledger};
use serde::de::DeserializeOwned;
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{ChangeSet, Result, StoreError, store::CommerceStore};

/// PostgreSQL-backed store implementation.
///
/// Aggregate state lives in JSONB columns next to a `version` column used
/// for optimistic concurrency. Status history and inventory movements are
/// written to their own append-only tables.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn decode<A>(row: &PgRow) -> Result<A>
    where
        A: AggregateRoot + DeserializeOwned,
    {
        let data: serde_json::Value = row.try_get("data")?;
        let mut aggregate: A = serde_json::from_value(data)?;
        aggregate.set_version(Version::new(row.try_get("version")?));
        Ok(aggregate)
    }

    fn row_to_movement(row: PgRow) -> Result<InventoryMovement> {
        let movement_type: String = row.try_get("movement_type")?;
        Ok(InventoryMovement {
            id: MovementId::from_uuid(row.try_get("id")?),
            product_id: ProductId::from_uuid(row.try_get("product_id")?),
            variant_id: row
                .try_get::<Option<Uuid>, _>("variant_id")?
                .map(VariantId::from_uuid),
            quantity_change: row.try_get("quantity_change")?,
            quantity_after: row.try_get("quantity_after")?,
            movement_type: serde_json::from_value(serde_json::Value::String(movement_type))?,
            reason: row.try_get("reason")?,
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            created_at: row.try_get("created_at")?,
        })
    }

    fn owner_key(owner: &CartOwner) -> (&'static str, String) {
        match owner {
            CartOwner::Customer { customer_id, .. } => ("customer", customer_id.to_string()),
            CartOwner::Guest { guest_id, .. } => ("guest", guest_id.as_str().to_string()),
        }
    }

    async fn stored_version(conn: &mut PgConnection, table: &str, id: Uuid) -> Result<Version> {
        let sql = format!("SELECT version FROM {table} WHERE id = $1");
        let version: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(Version::new(version.unwrap_or(0)))
    }

    async fn conflict<A: AggregateRoot>(
        conn: &mut PgConnection,
        table: &str,
        aggregate: &A,
    ) -> Result<StoreError> {
        let actual = Self::stored_version(conn, table, aggregate.aggregate_id()).await?;
        Ok(StoreError::ConcurrencyConflict {
            aggregate_type: A::aggregate_type(),
            aggregate_id: aggregate.aggregate_id(),
            expected: aggregate.version(),
            actual,
        })
    }

    async fn write_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
        let data = serde_json::to_value(order)?;
        let next = order.version().next();

        let rows = if order.version().is_initial() {
            sqlx::query(
                r#"
                INSERT INTO orders (id, store_id, customer_id, order_number, status, payment_status, data, version, placed_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(order.store_id().as_uuid())
            .bind(order.customer_id().as_uuid())
            .bind(order.order_number().as_str())
            .bind(order.status().as_str())
            .bind(order.payment().status.as_str())
            .bind(&data)
            .bind(next.as_i64())
            .bind(order.placed_at())
            .bind(order.updated_at())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $2, payment_status = $3, data = $4, version = $5, updated_at = $6
                WHERE id = $1 AND version = $7
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.payment().status.as_str())
            .bind(&data)
            .bind(next.as_i64())
            .bind(order.updated_at())
            .bind(order.version().as_i64())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            let actual = Self::stored_version(conn, "orders", order.id().as_uuid()).await?;
            if order.version().is_initial() && actual.is_initial() {
                return Err(StoreError::DuplicateOrderNumber {
                    store_id: order.store_id(),
                    order_number: order.order_number().to_string(),
                });
            }
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: order.id().as_uuid(),
                expected: order.version(),
                actual,
            });
        }

        for (position, change) in order.status_history().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_status_history (order_id, position, from_status, to_status, changed_at, notes)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (order_id, position) DO NOTHING
                "#,
            )
            .bind(order.id().as_uuid())
            .bind(position as i32)
            .bind(change.from.map(|status| status.as_str()))
            .bind(change.to.as_str())
            .bind(change.changed_at)
            .bind(change.notes.as_deref())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    async fn write_product(conn: &mut PgConnection, product: &Product) -> Result<()> {
        let data = serde_json::to_value(product)?;
        let next = product.version().next();

        let rows = if product.version().is_initial() {
            sqlx::query(
                r#"
                INSERT INTO products (id, store_id, name, data, version, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(product.id().as_uuid())
            .bind(product.store_id().as_uuid())
            .bind(product.name())
            .bind(&data)
            .bind(next.as_i64())
            .bind(product.updated_at())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE products
                SET name = $2, data = $3, version = $4, updated_at = $5
                WHERE id = $1 AND version = $6
                "#,
            )
            .bind(product.id().as_uuid())
            .bind(product.name())
            .bind(&data)
            .bind(next.as_i64())
            .bind(product.updated_at())
            .bind(product.version().as_i64())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            return Err(Self::conflict(conn, "products", product).await?);
        }

        let mut heads: HashMap<Option<VariantId>, i64> = HashMap::new();
        for movement in product.pending_movements() {
            let previous = match heads.get(&movement.variant_id) {
                Some(head) => *head,
                None => {
                    let head: Option<i64> = sqlx::query_scalar(
                        r#"
                        SELECT quantity_after FROM inventory_movements
                        WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
                        ORDER BY seq DESC
                        LIMIT 1
                        "#,
                    )
                    .bind(movement.product_id.as_uuid())
                    .bind(movement.variant_id.map(|id| id.as_uuid()))
                    .fetch_optional(&mut *conn)
                    .await?;
                    head.unwrap_or(0)
                }
            };

            if !ledger::continues(previous, movement) {
                return Err(StoreError::LedgerConflict {
                    product_id: movement.product_id,
                    variant_id: movement.variant_id,
                    expected: previous,
                    found: movement.quantity_after - movement.quantity_change,
                });
            }

            sqlx::query(
                r#"
                INSERT INTO inventory_movements (id, product_id, variant_id, quantity_change, quantity_after, movement_type, reason, order_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(movement.id.as_uuid())
            .bind(movement.product_id.as_uuid())
            .bind(movement.variant_id.map(|id| id.as_uuid()))
            .bind(movement.quantity_change)
            .bind(movement.quantity_after)
            .bind(movement.movement_type.as_str())
            .bind(&movement.reason)
            .bind(movement.order_id.map(|id| id.as_uuid()))
            .bind(movement.created_at)
            .execute(&mut *conn)
            .await?;

            heads.insert(movement.variant_id, movement.quantity_after);
        }

        Ok(())
    }

    async fn write_cart(conn: &mut PgConnection, cart: &Cart) -> Result<()> {
        let data = serde_json::to_value(cart)?;
        let next = cart.version().next();
        let (owner_kind, owner_key) = Self::owner_key(cart.owner());

        let rows = if cart.version().is_initial() {
            sqlx::query(
                r#"
                INSERT INTO carts (id, store_id, owner_kind, owner_key, data, version, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(cart.id().as_uuid())
            .bind(cart.owner().store_id().as_uuid())
            .bind(owner_kind)
            .bind(&owner_key)
            .bind(&data)
            .bind(next.as_i64())
            .bind(cart.updated_at())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        } else {
            sqlx::query(
                r#"
                UPDATE carts
                SET data = $2, version = $3, updated_at = $4
                WHERE id = $1 AND version = $5
                "#,
            )
            .bind(cart.id().as_uuid())
            .bind(&data)
            .bind(next.as_i64())
            .bind(cart.updated_at())
            .bind(cart.version().as_i64())
            .execute(&mut *conn)
            .await?
            .rows_affected()
        };

        if rows == 0 {
            return Err(Self::conflict(conn, "carts", cart).await?);
        }
        Ok(())
    }

    async fn delete_cart(conn: &mut PgConnection, cart_id: CartId, version: Version) -> Result<()> {
        if version.is_initial() {
            return Ok(());
        }
        let rows = sqlx::query("DELETE FROM carts WHERE id = $1 AND version = $2")
            .bind(cart_id.as_uuid())
            .bind(version.as_i64())
            .execute(&mut *conn)
            .await?
            .rows_affected();

        if rows == 0 {
            let actual = Self::stored_version(conn, "carts", cart_id.as_uuid()).await?;
            return Err(StoreError::ConcurrencyConflict {
                aggregate_type: Cart::aggregate_type(),
                aggregate_id: cart_id.as_uuid(),
                expected: version,
                actual,
            });
        }
        Ok(())
    }

    async fn fetch_cart(&self, sql: &str, binds: (Uuid, &str, &str)) -> Result<Option<Cart>> {
        let row = sqlx::query(sql)
            .bind(binds.0)
            .bind(binds.1)
            .bind(binds.2)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }
}

const CART_BY_OWNER: &str = r#"
    SELECT data, version FROM carts
    WHERE store_id = $1 AND owner_kind = $2 AND owner_key = $3
"#;

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT data, version FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn order_number_exists(&self, store_id: StoreId, order_number: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM orders WHERE store_id = $1 AND order_number = $2)",
        )
        .bind(store_id.as_uuid())
        .bind(order_number)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT data, version FROM products WHERE id = $1")
            .bind(product_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT data, version FROM carts WHERE id = $1")
            .bind(cart_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode).transpose()
    }

    async fn get_cart_by_customer(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
    ) -> Result<Option<Cart>> {
        let key = customer_id.to_string();
        self.fetch_cart(CART_BY_OWNER, (store_id.as_uuid(), "customer", &key))
            .await
    }

    async fn get_cart_by_guest(
        &self,
        store_id: StoreId,
        guest_id: &GuestId,
    ) -> Result<Option<Cart>> {
        self.fetch_cart(CART_BY_OWNER, (store_id.as_uuid(), "guest", guest_id.as_str()))
            .await
    }

    async fn movements_for(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<InventoryMovement>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, variant_id, quantity_change, quantity_after, movement_type, reason, order_id, created_at
            FROM inventory_movements
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            ORDER BY seq ASC
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(variant_id.map(|id| id.as_uuid()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_movement).collect()
    }

    #[tracing::instrument(
        skip(self, changes),
        fields(
            orders = changes.orders.len(),
            products = changes.products.len(),
            carts = changes.carts.len(),
        )
    )]
    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        let written: Result<()> = async {
            for order in &changes.orders {
                Self::write_order(&mut tx, order).await?;
            }
            for product in &changes.products {
                Self::write_product(&mut tx, product).await?;
            }
            for cart in &changes.carts {
                Self::write_cart(&mut tx, cart).await?;
            }
            for (cart_id, version) in &changes.deleted_carts {
                Self::delete_cart(&mut tx, *cart_id, *version).await?;
            }
            Ok(())
        }
        .await;

        if let Err(e) = written {
            metrics::counter!("store_commit_failures_total").increment(1);
            tracing::debug!(error = %e, "commit rejected, rolling back");
            tx.rollback().await?;
            return Err(e);
        }

        tx.commit().await?;
        metrics::counter!("store_commits_total").increment(1);
        metrics::histogram!("store_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn delete_expired_guest_carts(&self, now: DateTime<Utc>, ttl: Duration) -> Result<u64> {
        let cutoff = now - ttl;
        let result = sqlx::query("DELETE FROM carts WHERE owner_kind = 'guest' AND updated_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

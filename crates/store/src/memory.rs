use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{CartId, CustomerId, GuestId, OrderId, ProductId, StoreId, VariantId, Version};
use domain::{AggregateRoot, Cart, CartOwner, InventoryMovement, Order, Product, catalog::ledger};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{ChangeSet, Result, StoreError, store::CommerceStore};

#[derive(Default)]
struct Tables {
    orders: HashMap<OrderId, Order>,
    order_numbers: HashSet<(StoreId, String)>,
    products: HashMap<ProductId, Product>,
    movements: Vec<InventoryMovement>,
    carts: HashMap<CartId, Cart>,
}

impl Tables {
    fn ledger_head(&self, product_id: ProductId, variant_id: Option<VariantId>) -> i64 {
        self.movements
            .iter()
            .rev()
            .find(|m| m.product_id == product_id && m.variant_id == variant_id)
            .map(|m| m.quantity_after)
            .unwrap_or(0)
    }

    fn validate(&self, changes: &ChangeSet) -> Result<()> {
        for order in &changes.orders {
            check_version::<Order>(
                order.aggregate_id(),
                order.version(),
                self.orders.get(&order.id()).map(Order::version),
            )?;
            let key = (order.store_id(), order.order_number().as_str().to_string());
            if order.version().is_initial() && self.order_numbers.contains(&key) {
                return Err(StoreError::DuplicateOrderNumber {
                    store_id: key.0,
                    order_number: key.1,
                });
            }
        }

        for product in &changes.products {
            check_version::<Product>(
                product.aggregate_id(),
                product.version(),
                self.products.get(&product.id()).map(Product::version),
            )?;

            let mut heads: HashMap<Option<VariantId>, i64> = HashMap::new();
            for movement in product.pending_movements() {
                let previous = heads
                    .get(&movement.variant_id)
                    .copied()
                    .unwrap_or_else(|| self.ledger_head(product.id(), movement.variant_id));
                if !ledger::continues(previous, movement) {
                    return Err(StoreError::LedgerConflict {
                        product_id: product.id(),
                        variant_id: movement.variant_id,
                        expected: previous,
                        found: movement.quantity_after - movement.quantity_change,
                    });
                }
                heads.insert(movement.variant_id, movement.quantity_after);
            }
        }

        for cart in &changes.carts {
            check_version::<Cart>(
                cart.aggregate_id(),
                cart.version(),
                self.carts.get(&cart.id()).map(Cart::version),
            )?;
            if cart.version().is_initial()
                && let Some(existing) = self.carts.values().find(|c| c.owner() == cart.owner())
            {
                return Err(StoreError::ConcurrencyConflict {
                    aggregate_type: Cart::aggregate_type(),
                    aggregate_id: existing.aggregate_id(),
                    expected: Version::initial(),
                    actual: existing.version(),
                });
            }
        }

        for (cart_id, version) in &changes.deleted_carts {
            check_version::<Cart>(
                cart_id.as_uuid(),
                *version,
                self.carts.get(cart_id).map(Cart::version),
            )?;
        }

        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for mut order in changes.orders {
            order.set_version(order.version().next());
            order.drain_events();
            self.order_numbers
                .insert((order.store_id(), order.order_number().as_str().to_string()));
            self.orders.insert(order.id(), order);
        }

        for mut product in changes.products {
            product.set_version(product.version().next());
            product.drain_events();
            self.movements.extend(product.take_pending_movements());
            self.products.insert(product.id(), product);
        }

        for mut cart in changes.carts {
            cart.set_version(cart.version().next());
            cart.drain_events();
            self.carts.insert(cart.id(), cart);
        }

        for (cart_id, _) in changes.deleted_carts {
            self.carts.remove(&cart_id);
        }
    }
}

fn check_version<A: AggregateRoot>(
    aggregate_id: Uuid,
    expected: Version,
    stored: Option<Version>,
) -> Result<()> {
    let actual = stored.unwrap_or_else(Version::initial);
    if actual != expected {
        return Err(StoreError::ConcurrencyConflict {
            aggregate_type: A::aggregate_type(),
            aggregate_id,
            expected,
            actual,
        });
    }
    Ok(())
}

/// In-memory store implementation for testing.
///
/// Provides the same commit semantics as the PostgreSQL implementation: the
/// whole change set is validated under one write lock before anything is
/// applied.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail with `Unavailable` without writing anything.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Returns the number of successful commits.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn cart_count(&self) -> usize {
        self.tables.read().await.carts.len()
    }

    /// Returns the total number of persisted ledger movements.
    pub async fn movement_count(&self) -> usize {
        self.tables.read().await.movements.len()
    }
}

#[async_trait]
impl CommerceStore for InMemoryStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn order_number_exists(&self, store_id: StoreId, order_number: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .order_numbers
            .contains(&(store_id, order_number.to_string())))
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&cart_id).cloned())
    }

    async fn get_cart_by_customer(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
    ) -> Result<Option<Cart>> {
        let owner = CartOwner::customer(store_id, customer_id);
        let tables = self.tables.read().await;
        Ok(tables.carts.values().find(|c| *c.owner() == owner).cloned())
    }

    async fn get_cart_by_guest(
        &self,
        store_id: StoreId,
        guest_id: &GuestId,
    ) -> Result<Option<Cart>> {
        let owner = CartOwner::guest(store_id, guest_id.clone());
        let tables = self.tables.read().await;
        Ok(tables.carts.values().find(|c| *c.owner() == owner).cloned())
    }

    async fn movements_for(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<InventoryMovement>> {
        let tables = self.tables.read().await;
        Ok(tables
            .movements
            .iter()
            .filter(|m| m.product_id == product_id && m.variant_id == variant_id)
            .cloned()
            .collect())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            metrics::counter!("store_commit_failures_total").increment(1);
            return Err(StoreError::Unavailable(
                "simulated commit failure".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        if let Err(e) = tables.validate(&changes) {
            metrics::counter!("store_commit_failures_total").increment(1);
            tracing::debug!(error = %e, "commit rejected");
            return Err(e);
        }
        tables.apply(changes);

        self.commits.fetch_add(1, Ordering::SeqCst);
        metrics::counter!("store_commits_total").increment(1);
        Ok(())
    }

    async fn delete_expired_guest_carts(&self, now: DateTime<Utc>, ttl: Duration) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let before = tables.carts.len();
        tables.carts.retain(|_, cart| !cart.is_expired(now, ttl));
        Ok((before - tables.carts.len()) as u64)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use common::{CartId, CustomerId, GuestId, OrderId, ProductId, StoreId, VariantId};
use domain::{Cart, InventoryMovement, Order, Product, catalog::ledger};

use crate::{ChangeSet, Result};

/// Persistence boundary for the commerce aggregates.
///
/// Reads return aggregates with an empty event buffer, stamped with the
/// version they were stored at. All writes go through [`commit`], which
/// applies a whole [`ChangeSet`] atomically.
///
/// [`commit`]: CommerceStore::commit
#[async_trait]
pub trait CommerceStore: Send + Sync {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns true if the store already holds an order with this number.
    async fn order_number_exists(&self, store_id: StoreId, order_number: &str) -> Result<bool>;

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    async fn get_cart(&self, cart_id: CartId) -> Result<Option<Cart>>;

    async fn get_cart_by_customer(
        &self,
        store_id: StoreId,
        customer_id: CustomerId,
    ) -> Result<Option<Cart>>;

    async fn get_cart_by_guest(&self, store_id: StoreId, guest_id: &GuestId)
    -> Result<Option<Cart>>;

    /// Returns the persisted ledger for a product or variant, oldest first.
    async fn movements_for(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<Vec<InventoryMovement>>;

    /// Persists a change set atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any aggregate's stored version
    /// differs from the version it was loaded at (new aggregates must not
    /// exist yet), with `DuplicateOrderNumber` if a new order reuses a number
    /// in its store, and with `LedgerConflict` if a movement does not continue
    /// the stored chain. On failure nothing is written.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;

    /// Deletes guest carts inactive for at least `ttl`. Returns how many were
    /// removed.
    async fn delete_expired_guest_carts(&self, now: DateTime<Utc>, ttl: Duration) -> Result<u64>;
}

/// Convenience methods available on every store.
#[async_trait]
pub trait CommerceStoreExt: CommerceStore {
    /// Re-derives stock from the persisted ledger.
    async fn replay_stock(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<i64> {
        let movements = self.movements_for(product_id, variant_id).await?;
        Ok(ledger::replay(&movements)?)
    }
}

// Blanket implementation for all CommerceStore implementations
impl<T: CommerceStore + ?Sized> CommerceStoreExt for T {}

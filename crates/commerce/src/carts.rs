//! Cart use cases for guest and customer carts.

use std::sync::Arc;

use common::{CustomerId, GuestId, ProductId, StoreId, VariantId};
use domain::{AggregateRoot, Cart, CartError, CartLine, CartOwner};
use handlers::EventPublisher;
use store::CommerceStore;

use crate::cancellation::CancellationToken;
use crate::config::CommerceConfig;
use crate::unit_of_work::{UnitOfWork, with_conflict_retries};
use crate::{CommerceError, Result};

/// Cart use cases.
///
/// Callers identify a cart by its [`CartOwner`]; the service finds the
/// owner's cart or starts a new one.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
    publisher: Arc<dyn EventPublisher>,
    config: CommerceConfig,
}

impl<S> CartService<S>
where
    S: CommerceStore + Clone + 'static,
{
    pub fn new(store: S, publisher: Arc<dyn EventPublisher>, config: CommerceConfig) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// Returns the owner's cart, or a new empty one that is not yet saved.
    pub async fn get_cart(&self, owner: &CartOwner) -> Result<Cart> {
        let existing = match owner {
            CartOwner::Customer {
                store_id,
                customer_id,
            } => {
                self.store
                    .get_cart_by_customer(*store_id, *customer_id)
                    .await?
            }
            CartOwner::Guest { store_id, guest_id } => {
                self.store.get_cart_by_guest(*store_id, guest_id).await?
            }
        };
        Ok(existing.unwrap_or_else(|| Cart::new(owner.clone())))
    }

    /// Adds a product, summing with an existing line for the same product
    /// and variant.
    #[tracing::instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        with_conflict_retries("add_cart_item", self.config.conflict_retries, || async move {
            self.ensure_purchasable(owner.store_id(), product_id, variant_id)
                .await?;
            self.update_cart(owner, cancel, move |cart| {
                cart.add_item(product_id, variant_id, quantity)
            })
            .await
        })
        .await
    }

    /// Replaces a line's quantity. Zero removes the line.
    #[tracing::instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn update_item_quantity(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        with_conflict_retries("update_cart_item", self.config.conflict_retries, || {
            self.update_cart(owner, cancel, move |cart| {
                cart.update_quantity(product_id, variant_id, quantity)
            })
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        with_conflict_retries("remove_cart_item", self.config.conflict_retries, || {
            self.update_cart(owner, cancel, move |cart| cart.remove_item(product_id, variant_id))
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel), fields(owner = %owner))]
    pub async fn clear_cart(&self, owner: &CartOwner, cancel: &CancellationToken) -> Result<Cart> {
        with_conflict_retries("clear_cart", self.config.conflict_retries, || {
            self.update_cart(owner, cancel, |cart| {
                cart.clear();
                Ok(())
            })
        })
        .await
    }

    /// Merges guest lines into the owner's cart.
    ///
    /// Matching lines have their quantities summed and the rest are
    /// inserted. The batch is all-or-nothing: one invalid line or unknown
    /// product leaves the cart unchanged.
    #[tracing::instrument(skip(self, lines, cancel), fields(owner = %owner, lines = lines.len()))]
    pub async fn sync_cart(
        &self,
        owner: &CartOwner,
        lines: &[CartLine],
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        with_conflict_retries("sync_cart", self.config.conflict_retries, || async move {
            for line in lines {
                self.ensure_purchasable(owner.store_id(), line.product_id, line.variant_id)
                    .await?;
            }
            self.update_cart(owner, cancel, |cart| cart.merge(lines))
                .await
        })
        .await
    }

    /// Merges a guest's cart into the customer's cart at login and deletes
    /// the guest cart in the same commit.
    ///
    /// Guest lines are validated like [`sync_cart`](Self::sync_cart); a line
    /// for an unknown product or another store's product leaves both carts
    /// unchanged.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn merge_guest_cart(
        &self,
        store_id: StoreId,
        guest_id: &GuestId,
        customer_id: CustomerId,
        cancel: &CancellationToken,
    ) -> Result<Cart> {
        let guest_owner = &CartOwner::guest(store_id, guest_id.clone());
        let customer_owner = &CartOwner::customer(store_id, customer_id);

        with_conflict_retries("merge_guest_cart", self.config.conflict_retries, || async move {
            let Some(guest) = self.store.get_cart_by_guest(store_id, guest_id).await? else {
                return self.get_cart(customer_owner).await;
            };

            let lines = guest.lines();
            for line in &lines {
                self.ensure_purchasable(store_id, line.product_id, line.variant_id)
                    .await?;
            }

            let mut customer = self.get_cart(customer_owner).await?;
            customer.merge(&lines)?;
            let cart_id = customer.id();

            let mut uow = UnitOfWork::begin(self.store.clone(), cancel.clone());
            uow.track_cart(customer);
            uow.delete_cart(guest);
            let merged = uow
                .commit(self.publisher.as_ref())
                .await?
                .into_cart()
                .ok_or(CommerceError::CartNotFound(cart_id))?;
            tracing::info!(
                from = %guest_owner,
                total_items = merged.total_items(),
                "guest cart merged"
            );
            Ok(merged)
        })
        .await
    }

    async fn update_cart<F>(
        &self,
        owner: &CartOwner,
        cancel: &CancellationToken,
        apply: F,
    ) -> Result<Cart>
    where
        F: FnOnce(&mut Cart) -> std::result::Result<(), CartError>,
    {
        let mut cart = self.get_cart(owner).await?;
        apply(&mut cart)?;

        // Nothing to persist for an untouched new cart.
        if cart.version().is_initial() && cart.is_empty() {
            return Ok(cart);
        }

        let cart_id = cart.id();
        let mut uow = UnitOfWork::begin(self.store.clone(), cancel.clone());
        uow.track_cart(cart);
        uow.commit(self.publisher.as_ref())
            .await?
            .into_cart()
            .ok_or(CommerceError::CartNotFound(cart_id))
    }

    async fn ensure_purchasable(
        &self,
        store_id: StoreId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<()> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|product| product.store_id() == store_id)
            .ok_or(CommerceError::ProductNotFound(product_id))?;
        product.stock_level(variant_id)?;
        Ok(())
    }
}

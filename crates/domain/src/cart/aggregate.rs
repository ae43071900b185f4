//! Cart aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{CartId, ProductId, VariantId, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, EventBuffer};

use super::{CartCleared, CartError, CartEvent, CartMerged, CartOwner};

/// A line in the cart, keyed by `(product_id, variant_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Plain `(product, variant, quantity)` triple used for merges and checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

impl CartLine {
    pub fn new(product_id: ProductId, variant_id: Option<VariantId>, quantity: u32) -> Self {
        Self {
            product_id,
            variant_id,
            quantity,
        }
    }
}

/// Cart aggregate root. One cart per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    owner: CartOwner,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(default)]
    version: Version,

    #[serde(skip)]
    events: EventBuffer,
}

impl AggregateRoot for Cart {
    fn aggregate_type() -> &'static str {
        "Cart"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }
}

impl Cart {
    /// Creates an empty cart for `owner`.
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            owner,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
            version: Version::initial(),
            events: EventBuffer::new(),
        }
    }

    pub fn id(&self) -> CartId {
        self.id
    }

    pub fn owner(&self) -> &CartOwner {
        &self.owner
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sum of quantities across all lines.
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// The cart's contents as plain lines.
    pub fn lines(&self) -> Vec<CartLine> {
        self.items
            .iter()
            .map(|item| CartLine::new(item.product_id, item.variant_id, item.quantity))
            .collect()
    }

    /// Quantity held for a line, if present.
    pub fn quantity_of(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<u32> {
        self.find(product_id, variant_id).map(|item| item.quantity)
    }

    /// Guest carts expire after `ttl` without activity. Customer carts never
    /// expire.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.owner.is_guest() && now - self.updated_at >= ttl
    }

    /// Adds `quantity` of a line, incrementing it if already present.
    pub fn add_item(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { product_id });
        }
        let now = Utc::now();
        self.add_line(product_id, variant_id, quantity, now)?;
        self.updated_at = now;
        Ok(())
    }

    /// Replaces the quantity of an existing line. Zero removes it.
    pub fn update_quantity(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(product_id, variant_id);
        }
        let now = Utc::now();
        let item = self
            .find_mut(product_id, variant_id)
            .ok_or(CartError::ItemNotFound {
                product_id,
                variant_id,
            })?;
        item.quantity = quantity;
        item.updated_at = now;
        self.updated_at = now;
        Ok(())
    }

    pub fn remove_item(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Result<(), CartError> {
        let before = self.items.len();
        self.items
            .retain(|item| !(item.product_id == product_id && item.variant_id == variant_id));
        if self.items.len() == before {
            return Err(CartError::ItemNotFound {
                product_id,
                variant_id,
            });
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Removes every line. Raises `CartCleared` only if the cart had items.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        self.items.clear();
        self.updated_at = Utc::now();
        self.record(CartEvent::CartCleared(CartCleared { cart_id: self.id }));
    }

    /// Merges a batch of lines into this cart.
    ///
    /// Lines already present have their quantities summed; new lines are
    /// inserted. The batch is applied to a copy of the items and swapped in
    /// only if every line succeeds, so a failure leaves the cart unchanged.
    pub fn merge(&mut self, lines: &[CartLine]) -> Result<(), CartError> {
        let now = Utc::now();
        let mut staged = self.clone();
        for line in lines {
            if line.quantity == 0 {
                return Err(CartError::InvalidQuantity {
                    product_id: line.product_id,
                });
            }
            staged.add_line(line.product_id, line.variant_id, line.quantity, now)?;
        }

        self.items = staged.items;
        if !lines.is_empty() {
            self.updated_at = now;
        }

        let merged = CartEvent::CartMerged(CartMerged {
            cart_id: self.id,
            store_id: self.owner.store_id(),
            merged_lines: lines.len(),
            total_items: self.total_items(),
        });
        self.record(merged);
        Ok(())
    }

    fn add_line(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        match self.find_mut(product_id, variant_id) {
            Some(item) => {
                item.quantity = item
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::QuantityOverflow { product_id })?;
                item.updated_at = now;
            }
            None => self.items.push(CartItem {
                product_id,
                variant_id,
                quantity,
                added_at: now,
                updated_at: now,
            }),
        }
        Ok(())
    }

    fn find(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<&CartItem> {
        self.items
            .iter()
            .find(|item| item.product_id == product_id && item.variant_id == variant_id)
    }

    fn find_mut(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id && item.variant_id == variant_id)
    }

    fn record(&mut self, event: CartEvent) {
        self.events
            .record(Self::aggregate_type(), self.id.as_uuid(), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, GuestId, StoreId};

    fn customer_cart() -> Cart {
        Cart::new(CartOwner::customer(StoreId::new(), CustomerId::new()))
    }

    fn guest_cart() -> Cart {
        Cart::new(CartOwner::guest(
            StoreId::new(),
            GuestId::new("guest-token").unwrap(),
        ))
    }

    #[test]
    fn test_add_item_increments_existing_line() {
        let mut cart = customer_cart();
        let product = ProductId::new();
        cart.add_item(product, None, 2).unwrap();
        cart.add_item(product, None, 1).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(product, None), Some(3));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn test_variants_are_separate_lines() {
        let mut cart = customer_cart();
        let product = ProductId::new();
        let variant = VariantId::new();
        cart.add_item(product, None, 1).unwrap();
        cart.add_item(product, Some(variant), 4).unwrap();

        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.quantity_of(product, Some(variant)), Some(4));
    }

    #[test]
    fn test_add_zero_quantity_rejected() {
        let mut cart = customer_cart();
        let product = ProductId::new();
        assert_eq!(
            cart.add_item(product, None, 0),
            Err(CartError::InvalidQuantity { product_id: product })
        );
    }

    #[test]
    fn test_update_quantity_replaces_and_zero_removes() {
        let mut cart = customer_cart();
        let product = ProductId::new();
        cart.add_item(product, None, 2).unwrap();

        cart.update_quantity(product, None, 7).unwrap();
        assert_eq!(cart.quantity_of(product, None), Some(7));

        cart.update_quantity(product, None, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_missing_item_fails() {
        let mut cart = customer_cart();
        assert!(matches!(
            cart.update_quantity(ProductId::new(), None, 1),
            Err(CartError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_remove_missing_item_fails() {
        let mut cart = customer_cart();
        assert!(matches!(
            cart.remove_item(ProductId::new(), None),
            Err(CartError::ItemNotFound { .. })
        ));
    }

    #[test]
    fn test_clear_raises_event_only_when_not_empty() {
        let mut cart = customer_cart();
        cart.clear();
        assert!(!cart.has_pending_events());

        cart.add_item(ProductId::new(), None, 1).unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.events().pending()[0].event_type(), "CartCleared");
    }

    #[test]
    fn test_merge_sums_matching_lines() {
        let a = ProductId::new();
        let b = ProductId::new();

        let mut guest = guest_cart();
        guest.add_item(a, None, 2).unwrap();
        guest.add_item(b, None, 1).unwrap();

        let mut customer = customer_cart();
        customer.add_item(a, None, 1).unwrap();

        customer.merge(&guest.lines()).unwrap();

        assert_eq!(customer.quantity_of(a, None), Some(3));
        assert_eq!(customer.quantity_of(b, None), Some(1));
        assert_eq!(customer.items().len(), 2);
        assert_eq!(customer.events().pending()[0].event_type(), "CartMerged");
    }

    #[test]
    fn test_merge_into_empty_cart_copies_lines() {
        let a = ProductId::new();
        let b = ProductId::new();
        let variant = VariantId::new();

        let mut guest = guest_cart();
        guest.add_item(a, None, 2).unwrap();
        guest.add_item(b, Some(variant), 5).unwrap();

        let mut customer = customer_cart();
        customer.merge(&guest.lines()).unwrap();

        assert_eq!(customer.lines(), guest.lines());
    }

    #[test]
    fn test_merge_is_all_or_nothing() {
        let a = ProductId::new();
        let b = ProductId::new();

        let mut customer = customer_cart();
        customer.add_item(a, None, 1).unwrap();
        customer.add_item(b, None, u32::MAX).unwrap();
        let before = customer.lines();

        let batch = [CartLine::new(a, None, 4), CartLine::new(b, None, 1)];
        assert_eq!(
            customer.merge(&batch),
            Err(CartError::QuantityOverflow { product_id: b })
        );
        assert_eq!(customer.lines(), before);
        assert!(!customer.has_pending_events());
    }

    #[test]
    fn test_merge_rejects_zero_quantity_line() {
        let a = ProductId::new();
        let mut customer = customer_cart();
        let batch = [CartLine::new(a, None, 2), CartLine::new(ProductId::new(), None, 0)];
        assert!(matches!(
            customer.merge(&batch),
            Err(CartError::InvalidQuantity { .. })
        ));
        assert!(customer.is_empty());
    }

    #[test]
    fn test_only_guest_carts_expire() {
        let ttl = Duration::days(30);
        let later = Utc::now() + Duration::days(31);

        assert!(guest_cart().is_expired(later, ttl));
        assert!(!guest_cart().is_expired(Utc::now(), ttl));
        assert!(!customer_cart().is_expired(later, ttl));
    }

    #[test]
    fn test_owner_serialization_is_tagged() {
        let owner = CartOwner::guest(StoreId::new(), GuestId::new("abc").unwrap());
        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json["kind"], "guest");
        assert_eq!(json["guest_id"], "abc");
        let back: CartOwner = serde_json::from_value(json).unwrap();
        assert_eq!(back, owner);
    }
}

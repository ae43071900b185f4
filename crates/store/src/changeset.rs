use common::{CartId, Version};
use domain::{AggregateRoot, Cart, Order, Product};

/// Every aggregate write produced by one unit of work.
///
/// A change set is committed atomically: either every order, product (with
/// its pending ledger movements) and cart is written, or nothing is.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub orders: Vec<Order>,
    pub products: Vec<Product>,
    pub carts: Vec<Cart>,
    /// Carts to delete, with the version they were loaded at.
    pub deleted_carts: Vec<(CartId, Version)>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn with_product(mut self, product: Product) -> Self {
        self.products.push(product);
        self
    }

    pub fn with_cart(mut self, cart: Cart) -> Self {
        self.carts.push(cart);
        self
    }

    pub fn delete_cart(mut self, cart: &Cart) -> Self {
        self.deleted_carts.push((cart.id(), cart.version()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
            && self.products.is_empty()
            && self.carts.is_empty()
            && self.deleted_carts.is_empty()
    }

    /// Number of ledger movements carried by the products.
    pub fn movement_count(&self) -> usize {
        self.products
            .iter()
            .map(|product| product.pending_movements().len())
            .sum()
    }
}

//! Shopping cart aggregate.

mod aggregate;
mod events;
mod owner;

pub use aggregate::{Cart, CartItem, CartLine};
pub use events::{CartCleared, CartEvent, CartMerged};
pub use owner::CartOwner;

use common::{ProductId, VariantId};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Invalid quantity for product {product_id} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId },

    #[error("Product {product_id} is not in the cart")]
    ItemNotFound {
        product_id: ProductId,
        variant_id: Option<VariantId>,
    },

    #[error("Quantity for product {product_id} exceeds the maximum")]
    QuantityOverflow { product_id: ProductId },
}

//! Products, stock levels and the inventory ledger.

mod events;
pub mod ledger;
mod product;

pub use events::{ProductEvent, StockChangedData, VariantStockLowData};
pub use product::{Product, StockLevel, Variant};

use chrono::{DateTime, Utc};
use common::{MovementId, OrderId, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementType {
    /// Opening balance when stock is first recorded.
    Initial,
    /// Reserved by a placed order.
    Sale,
    Restock,
    /// Manual merchant correction.
    Adjustment,
    /// Stock coming back: a customer return, or the release of a
    /// cancelled order's reservation (linked by `order_id`).
    Return,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Initial => "Initial",
            MovementType::Sale => "Sale",
            MovementType::Restock => "Restock",
            MovementType::Adjustment => "Adjustment",
            MovementType::Return => "Return",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only ledger entry. Never updated or deleted once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryMovement {
    pub id: MovementId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity_change: i64,
    /// Quantity immediately after this movement.
    pub quantity_after: i64,
    pub movement_type: MovementType,
    pub reason: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

/// Errors raised when adjusting stock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    #[error("Variant {variant_id} not found on product {product_id}")]
    VariantNotFound {
        product_id: ProductId,
        variant_id: VariantId,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        requested: i64,
        available: i64,
    },

    #[error("Inventory adjustment must not be zero")]
    ZeroAdjustment,

    #[error("Stock quantity overflow for product {product_id}")]
    Overflow {
        product_id: ProductId,
        variant_id: Option<VariantId>,
    },
}

/// Errors found while replaying or verifying a movement log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Ledger chain broken at movement {index}: expected quantity {expected}, found {found}")]
    ChainBroken { index: usize, expected: i64, found: i64 },

    #[error("Recorded quantity {recorded} does not match replayed quantity {replayed}")]
    QuantityMismatch { recorded: i64, replayed: i64 },

    #[error("Quantity overflow while replaying movement {index}")]
    Overflow { index: usize },
}

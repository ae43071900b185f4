//! Product domain events.

use common::{OrderId, ProductId, StoreId, VariantId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::MovementType;

/// Events raised by the product aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// On-hand quantity changed through the ledger.
    StockChanged(StockChangedData),

    /// Quantity dropped below the configured low-stock threshold.
    VariantStockLow(VariantStockLowData),
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::StockChanged(_) => "StockChanged",
            ProductEvent::VariantStockLow(_) => "VariantStockLow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChangedData {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub variant_id: Option<VariantId>,
    pub quantity_change: i64,
    pub quantity_after: i64,
    pub movement_type: MovementType,
    pub order_id: Option<OrderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantStockLowData {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub variant_id: Option<VariantId>,
    pub quantity: i64,
    pub threshold: i64,
}

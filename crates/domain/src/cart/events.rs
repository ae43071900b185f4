//! Cart domain events.

use common::{CartId, StoreId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

/// Events raised by the cart aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CartEvent {
    /// A batch of lines was merged into the cart.
    CartMerged(CartMerged),

    /// Every line was removed.
    CartCleared(CartCleared),
}

impl DomainEvent for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartMerged(_) => "CartMerged",
            CartEvent::CartCleared(_) => "CartCleared",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartMerged {
    pub cart_id: CartId,
    pub store_id: StoreId,
    pub merged_lines: usize,
    pub total_items: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
}

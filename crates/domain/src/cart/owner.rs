//! Cart ownership.

use common::{CustomerId, GuestId, StoreId};
use serde::{Deserialize, Serialize};

/// Who a cart belongs to. Exactly one kind per cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CartOwner {
    /// An authenticated store customer.
    Customer {
        store_id: StoreId,
        customer_id: CustomerId,
    },
    /// An anonymous visitor identified by an opaque token.
    Guest { store_id: StoreId, guest_id: GuestId },
}

impl CartOwner {
    pub fn customer(store_id: StoreId, customer_id: CustomerId) -> Self {
        CartOwner::Customer {
            store_id,
            customer_id,
        }
    }

    pub fn guest(store_id: StoreId, guest_id: GuestId) -> Self {
        CartOwner::Guest { store_id, guest_id }
    }

    pub fn store_id(&self) -> StoreId {
        match self {
            CartOwner::Customer { store_id, .. } | CartOwner::Guest { store_id, .. } => *store_id,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, CartOwner::Guest { .. })
    }
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartOwner::Customer { customer_id, .. } => write!(f, "customer:{customer_id}"),
            CartOwner::Guest { guest_id, .. } => write!(f, "guest:{guest_id}"),
        }
    }
}

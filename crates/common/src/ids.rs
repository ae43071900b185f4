use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Declares a `Copy` identifier newtype over a UUID.
///
/// Every id shares the same surface: random construction, conversion from and
/// to `Uuid`, transparent serialization and `Display`.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

uuid_id!(
    /// Identifies a merchant's store (the tenant).
    StoreId
);
uuid_id!(
    /// Identifies a customer registered with a store.
    CustomerId
);
uuid_id!(
    /// Identifies an order.
    OrderId
);
uuid_id!(
    /// Identifies a product in a store's catalog.
    ProductId
);
uuid_id!(
    /// Identifies a purchasable variant of a product.
    VariantId
);
uuid_id!(
    /// Identifies a cart.
    CartId
);
uuid_id!(
    /// Identifies an inventory ledger entry.
    MovementId
);
uuid_id!(
    /// Identifies a raised domain event.
    EventId
);

/// Error returned when a guest identifier is blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("guest id must not be blank")]
pub struct GuestIdError;

/// Opaque identifier issued to an anonymous shopper (usually a cookie value).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GuestId(String);

impl GuestId {
    /// Creates a guest id, rejecting blank values.
    pub fn new(id: impl Into<String>) -> Result<Self, GuestIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(GuestIdError);
        }
        Ok(Self(id))
    }

    /// Returns the guest id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GuestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for GuestId {
    type Error = GuestIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GuestId> for String {
    fn from(id: GuestId) -> Self {
        id.0
    }
}

//! Primitive value types shared by every crate in the commerce core.
//!
//! Identifiers are strongly typed so an `OrderId` can never be passed where a
//! `ProductId` is expected, and `Money` always carries its currency.

pub mod ids;
pub mod money;
pub mod version;

pub use ids::{
    CartId, CustomerId, EventId, GuestId, GuestIdError, MovementId, OrderId, ProductId, StoreId,
    VariantId,
};
pub use money::{Currency, Money, MoneyError};
pub use version::Version;

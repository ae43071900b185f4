//! Domain layer for the storefront commerce core.
//!
//! This crate provides:
//! - [`AggregateRoot`] and the in-memory [`EventBuffer`] every aggregate owns
//! - [`Order`] with its lifecycle and payment state machines
//! - [`Product`] with the append-only inventory ledger
//! - [`Cart`] with guest/customer ownership and the merge protocol
//!
//! Aggregates never publish events themselves. Business methods record events
//! into the buffer and the unit of work drains them after a successful commit.

pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod event;
pub mod order;

pub use aggregate::{AggregateRoot, EventBuffer};
pub use cart::{Cart, CartError, CartEvent, CartItem, CartLine, CartOwner};
pub use catalog::{
    InventoryError, InventoryMovement, LedgerError, MovementType, Product, ProductEvent,
    StockLevel, Variant,
};
pub use event::{CommerceEvent, DomainEvent, EventEnvelope};
pub use order::{
    DeliveryAddress, NewOrder, Order, OrderError, OrderEvent, OrderItem, OrderLine, OrderNumber,
    OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, StatusChange, StockRelease,
};

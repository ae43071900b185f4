//! Commerce use cases.
//!
//! This crate is the orchestration layer over the aggregates:
//! - [`UnitOfWork`]: commit a change set, then publish its events
//! - [`OrderService`]: placement with stock reservation, lifecycle, payment
//! - [`CartService`]: guest and customer carts, merge at login
//! - [`OrderNumberAllocator`]: per-store unique order numbers
//! - [`CartExpirySweeper`]: periodic guest cart cleanup
//! - [`ClearCartOnOrderPlaced`]: empties the cart after checkout

pub mod allocator;
pub mod cancellation;
pub mod carts;
pub mod config;
pub mod error;
pub mod orders;
pub mod payment;
pub mod reactions;
pub mod sweeper;
pub mod unit_of_work;

pub use allocator::{OrderNumberAllocator, OrderNumberLookup, Reservation};
pub use cancellation::CancellationToken;
pub use carts::CartService;
pub use config::CommerceConfig;
pub use error::{CommerceError, ErrorResponse, Result};
pub use orders::{OrderService, PaymentResult, PlaceOrder};
pub use payment::{InMemoryPaymentProcessor, PaymentOutcome, PaymentProcessor, ProcessorError};
pub use reactions::ClearCartOnOrderPlaced;
pub use sweeper::CartExpirySweeper;
pub use unit_of_work::{Committed, UnitOfWork};

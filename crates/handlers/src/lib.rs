//! Post-commit domain event dispatch.
//!
//! This crate provides the consuming side of the unit of work:
//! - [`EventHandler`] trait for reacting to committed domain events
//! - [`EventPublisher`], the boundary the unit of work publishes through
//! - [`EventDispatcher`], which fans each event out to registered handlers
//! - Read model views: event log, low-stock alerts, order notifications

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod read_model;
pub mod views;

pub use dispatcher::{DispatchReport, EventDispatcher};
pub use error::{HandlerError, Result};
pub use handler::{EventHandler, EventPublisher, NullPublisher};
pub use read_model::ReadModel;
pub use views::{EventLogView, LowStockView, OrderNotificationsView};

//! Domain event envelope and the closed set of events the core raises.

use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::CartEvent;
use crate::catalog::ProductEvent;
use crate::order::OrderEvent;

/// Trait for domain event payloads.
///
/// Domain events are immutable facts named in the past tense.
pub trait DomainEvent {
    /// Returns the event type name, used for routing and logging.
    fn event_type(&self) -> &'static str;
}

/// Every event the commerce core can raise, grouped by aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "aggregate", content = "event")]
pub enum CommerceEvent {
    Order(OrderEvent),
    Product(ProductEvent),
    Cart(CartEvent),
}

impl DomainEvent for CommerceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CommerceEvent::Order(event) => event.event_type(),
            CommerceEvent::Product(event) => event.event_type(),
            CommerceEvent::Cart(event) => event.event_type(),
        }
    }
}

impl From<OrderEvent> for CommerceEvent {
    fn from(event: OrderEvent) -> Self {
        CommerceEvent::Order(event)
    }
}

impl From<ProductEvent> for CommerceEvent {
    fn from(event: ProductEvent) -> Self {
        CommerceEvent::Product(event)
    }
}

impl From<CartEvent> for CommerceEvent {
    fn from(event: CartEvent) -> Self {
        CommerceEvent::Cart(event)
    }
}

/// A raised event together with its identity and origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// When the aggregate raised the event.
    pub occurred_at: DateTime<Utc>,

    /// The type of aggregate that raised it (e.g. "Order").
    pub aggregate_type: String,

    /// The id of the aggregate that raised it.
    pub aggregate_id: Uuid,

    /// The event payload.
    pub event: CommerceEvent,
}

impl EventEnvelope {
    /// Wraps an event raised now by the given aggregate.
    pub fn new(
        aggregate_type: &'static str,
        aggregate_id: Uuid,
        event: impl Into<CommerceEvent>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            occurred_at: Utc::now(),
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
            event: event.into(),
        }
    }

    /// Returns the payload's event type name.
    pub fn event_type(&self) -> &'static str {
        self.event.event_type()
    }
}

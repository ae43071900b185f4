//! Aggregate root trait and the pending-event buffer.

use common::Version;
use uuid::Uuid;

use crate::event::{CommerceEvent, EventEnvelope};

/// Events raised by an aggregate that have not been dispatched yet.
///
/// The buffer lives only in memory; it is never persisted and is emptied by
/// [`AggregateRoot::drain_events`] once the owning unit of work has committed.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    pending: Vec<EventEnvelope>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an event raised by the given aggregate.
    pub fn record(
        &mut self,
        aggregate_type: &'static str,
        aggregate_id: Uuid,
        event: impl Into<CommerceEvent>,
    ) {
        self.pending
            .push(EventEnvelope::new(aggregate_type, aggregate_id, event));
    }

    /// Returns the buffered events in the order they were raised.
    pub fn pending(&self) -> &[EventEnvelope] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns every buffered event.
    pub fn drain(&mut self) -> Vec<EventEnvelope> {
        std::mem::take(&mut self.pending)
    }
}

/// Trait for aggregate roots persisted by the unit of work.
///
/// An aggregate is a consistency boundary mutated only through its own
/// methods. Those methods buffer domain events; the persistence boundary
/// calls [`drain_events`](AggregateRoot::drain_events) after commit.
pub trait AggregateRoot: Send + Sync {
    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str
    where
        Self: Sized;

    /// Returns the aggregate's identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the persisted version the aggregate was loaded at.
    fn version(&self) -> Version;

    /// Sets the version. Called by the persistence layer after commit.
    fn set_version(&mut self, version: Version);

    /// Returns the pending event buffer.
    fn events(&self) -> &EventBuffer;

    /// Returns the pending event buffer mutably.
    fn events_mut(&mut self) -> &mut EventBuffer;

    /// Removes and returns every pending event.
    fn drain_events(&mut self) -> Vec<EventEnvelope> {
        self.events_mut().drain()
    }

    /// Returns true if events are waiting to be dispatched.
    fn has_pending_events(&self) -> bool {
        !self.events().is_empty()
    }
}

//! Handler and publisher traits.

use async_trait::async_trait;
use domain::EventEnvelope;

use crate::Result;

/// Reacts to domain events after the change that raised them has committed.
///
/// Handlers never see events from a failed commit. A handler error is logged
/// and counted by the dispatcher; it never undoes the commit.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Returns true if this handler wants the event. Defaults to every event.
    fn handles(&self, _event: &EventEnvelope) -> bool {
        true
    }

    /// Handles a single committed event.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;
}

/// Boundary the unit of work publishes committed events through.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one committed event.
    async fn publish(&self, event: &EventEnvelope) -> Result<()>;
}

/// Publisher that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, event: &EventEnvelope) -> Result<()> {
        tracing::trace!(event_type = event.event_type(), "event discarded");
        Ok(())
    }
}

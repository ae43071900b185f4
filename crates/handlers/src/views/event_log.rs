//! Event log read model: every committed event, in delivery order.

use std::sync::Arc;

use async_trait::async_trait;
use domain::EventEnvelope;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::Result;
use crate::handler::EventHandler;
use crate::read_model::ReadModel;

/// Append-only log of delivered events.
///
/// Useful for auditing and for asserting exactly what was observed after a
/// commit.
#[derive(Clone, Default)]
pub struct EventLogView {
    events: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl EventLogView {
    /// Creates a new empty event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every delivered event.
    pub async fn events(&self) -> Vec<EventEnvelope> {
        self.events.read().await.clone()
    }

    /// Returns the event type names in delivery order.
    pub async fn event_types(&self) -> Vec<&'static str> {
        self.events
            .read()
            .await
            .iter()
            .map(EventEnvelope::event_type)
            .collect()
    }

    /// Returns the events raised by one aggregate.
    pub async fn events_for(&self, aggregate_id: Uuid) -> Vec<EventEnvelope> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    /// Returns how many delivered events have the given type.
    pub async fn count_of(&self, event_type: &str) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

#[async_trait]
impl EventHandler for EventLogView {
    fn name(&self) -> &'static str {
        "EventLogView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        self.events.write().await.push(event.clone());
        Ok(())
    }
}

impl ReadModel for EventLogView {
    fn name(&self) -> &'static str {
        "EventLogView"
    }

    fn count(&self) -> usize {
        self.events.try_read().map(|e| e.len()).unwrap_or(0)
    }
}

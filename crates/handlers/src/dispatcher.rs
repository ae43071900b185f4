//! Event dispatcher for fanning committed events out to handlers.

use async_trait::async_trait;
use domain::EventEnvelope;

use crate::handler::{EventHandler, EventPublisher};
use crate::{HandlerError, Result};

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers that processed the event successfully.
    pub delivered: usize,
    /// Handlers that returned an error.
    pub failed: usize,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Delivers each event to every registered handler that accepts it.
///
/// Handlers run sequentially in registration order. A failing handler does
/// not stop delivery to the handlers after it.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler with this dispatcher.
    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Returns the number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Delivers a single event to all interested handlers.
    #[tracing::instrument(skip(self, event), fields(event_type = event.event_type()))]
    pub async fn dispatch(&self, event: &EventEnvelope) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in self.handlers.iter().filter(|h| h.handles(event)) {
            match handler.handle(event).await {
                Ok(()) => {
                    report.delivered += 1;
                    metrics::counter!("events_delivered_total", "handler" => handler.name())
                        .increment(1);
                }
                Err(e) => {
                    report.failed += 1;
                    metrics::counter!("event_handler_failures_total", "handler" => handler.name())
                        .increment(1);
                    tracing::warn!(
                        handler = handler.name(),
                        event_id = %event.event_id,
                        error = %e,
                        "event handler failed"
                    );
                }
            }
        }

        report
    }
}

#[async_trait]
impl EventPublisher for EventDispatcher {
    async fn publish(&self, event: &EventEnvelope) -> Result<()> {
        let report = self.dispatch(event).await;
        if report.is_clean() {
            Ok(())
        } else {
            Err(HandlerError::DeliveryFailed {
                event_type: event.event_type(),
                failed: report.failed,
            })
        }
    }
}

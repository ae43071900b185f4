//! Follow-up reactions to committed events.

use async_trait::async_trait;
use domain::{CartOwner, CommerceEvent, EventEnvelope, OrderEvent};
use handlers::{EventHandler, HandlerError};
use store::CommerceStore;

use crate::cancellation::CancellationToken;
use crate::carts::CartService;

/// Empties the customer's cart once their order has been placed.
///
/// Runs in its own unit of work after the order commit. The cart service it
/// uses should publish to a dispatcher that does not include this handler.
pub struct ClearCartOnOrderPlaced<S> {
    carts: CartService<S>,
}

impl<S> ClearCartOnOrderPlaced<S> {
    pub fn new(carts: CartService<S>) -> Self {
        Self { carts }
    }
}

#[async_trait]
impl<S> EventHandler for ClearCartOnOrderPlaced<S>
where
    S: CommerceStore + Clone + 'static,
{
    fn name(&self) -> &'static str {
        "ClearCartOnOrderPlaced"
    }

    fn handles(&self, event: &EventEnvelope) -> bool {
        matches!(event.event, CommerceEvent::Order(OrderEvent::OrderPlaced(_)))
    }

    async fn handle(&self, event: &EventEnvelope) -> handlers::Result<()> {
        let CommerceEvent::Order(OrderEvent::OrderPlaced(placed)) = &event.event else {
            return Ok(());
        };

        let owner = CartOwner::customer(placed.store_id, placed.customer_id);
        let cart = self
            .carts
            .clear_cart(&owner, &CancellationToken::new())
            .await
            .map_err(|e| HandlerError::failed(self.name(), e.to_string()))?;
        tracing::debug!(cart_id = %cart.id(), order_id = %placed.order_id, "cart cleared after checkout");
        Ok(())
    }
}

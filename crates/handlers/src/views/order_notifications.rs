//! Customer-facing order notifications.
//!
//! Every order lifecycle and payment event becomes one notification in the
//! order's feed, in the order events were dispatched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{CommerceEvent, EventEnvelope, OrderEvent, OrderStatus};
use tokio::sync::RwLock;

use crate::Result;
use crate::handler::EventHandler;
use crate::read_model::ReadModel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    Placed { order_number: String },
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled { reason: String },
    PaymentReceived,
    PaymentFailed { error: String },
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub occurred_at: DateTime<Utc>,
}

/// Per-order notification feed.
#[derive(Clone, Default)]
pub struct OrderNotificationsView {
    feeds: Arc<RwLock<HashMap<OrderId, Vec<Notification>>>>,
}

impl OrderNotificationsView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications for an order, oldest first.
    pub async fn for_order(&self, order_id: OrderId) -> Vec<Notification> {
        self.feeds
            .read()
            .await
            .get(&order_id)
            .cloned()
            .unwrap_or_default()
    }
}

fn notification_for(event: &OrderEvent) -> (OrderId, NotificationKind) {
    match event {
        OrderEvent::OrderPlaced(data) => (
            data.order_id,
            NotificationKind::Placed {
                order_number: data.order_number.to_string(),
            },
        ),
        OrderEvent::OrderStatusChanged(data) => {
            let kind = match data.to {
                OrderStatus::Confirmed => NotificationKind::Confirmed,
                OrderStatus::Processing => NotificationKind::Processing,
                _ => NotificationKind::Shipped,
            };
            (data.order_id, kind)
        }
        OrderEvent::OrderDelivered(data) => (data.order_id, NotificationKind::Delivered),
        OrderEvent::OrderCancelled(data) => (
            data.order_id,
            NotificationKind::Cancelled {
                reason: data.reason.clone(),
            },
        ),
        OrderEvent::PaymentSucceeded(data) => (data.order_id, NotificationKind::PaymentReceived),
        OrderEvent::PaymentFailed(data) => (
            data.order_id,
            NotificationKind::PaymentFailed {
                error: data.error.clone(),
            },
        ),
        OrderEvent::PaymentRefunded(data) => (data.order_id, NotificationKind::Refunded),
    }
}

#[async_trait]
impl EventHandler for OrderNotificationsView {
    fn name(&self) -> &'static str {
        "OrderNotificationsView"
    }

    fn handles(&self, event: &EventEnvelope) -> bool {
        matches!(event.event, CommerceEvent::Order(_))
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let CommerceEvent::Order(order_event) = &event.event else {
            return Ok(());
        };

        let (order_id, kind) = notification_for(order_event);
        tracing::debug!(%order_id, ?kind, "order notification queued");

        self.feeds
            .write()
            .await
            .entry(order_id)
            .or_default()
            .push(Notification {
                order_id,
                kind,
                occurred_at: event.occurred_at,
            });
        Ok(())
    }
}

impl ReadModel for OrderNotificationsView {
    fn name(&self) -> &'static str {
        "OrderNotificationsView"
    }

    fn count(&self) -> usize {
        self.feeds
            .try_read()
            .map(|feeds| feeds.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::StoreId;
    use domain::order::{OrderStatusChangedData, PaymentFailedData};

    fn envelope(order_id: OrderId, event: OrderEvent) -> EventEnvelope {
        EventEnvelope::new("Order", order_id.as_uuid(), event)
    }

    #[tokio::test]
    async fn test_feed_follows_dispatch_order() {
        let view = OrderNotificationsView::new();
        let order_id = OrderId::new();
        let store_id = StoreId::new();

        for to in [OrderStatus::Confirmed, OrderStatus::Processing, OrderStatus::Shipped] {
            let from = match to {
                OrderStatus::Confirmed => OrderStatus::Pending,
                OrderStatus::Processing => OrderStatus::Confirmed,
                _ => OrderStatus::Processing,
            };
            view.handle(&envelope(
                order_id,
                OrderEvent::OrderStatusChanged(OrderStatusChangedData {
                    order_id,
                    store_id,
                    from,
                    to,
                }),
            ))
            .await
            .unwrap();
        }

        let kinds: Vec<_> = view
            .for_order(order_id)
            .await
            .into_iter()
            .map(|n| n.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                NotificationKind::Confirmed,
                NotificationKind::Processing,
                NotificationKind::Shipped
            ]
        );
    }

    #[tokio::test]
    async fn test_payment_failure_carries_error() {
        let view = OrderNotificationsView::new();
        let order_id = OrderId::new();
        view.handle(&envelope(
            order_id,
            OrderEvent::PaymentFailed(PaymentFailedData {
                order_id,
                error: "card declined".to_string(),
            }),
        ))
        .await
        .unwrap();

        let feed = view.for_order(order_id).await;
        assert_eq!(
            feed[0].kind,
            NotificationKind::PaymentFailed {
                error: "card declined".to_string()
            }
        );
        assert_eq!(ReadModel::count(&view), 1);
        assert!(view.for_order(OrderId::new()).await.is_empty());
    }
}

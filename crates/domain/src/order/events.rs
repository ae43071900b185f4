//! Order domain events.

use common::{CustomerId, Money, OrderId, StoreId};
use serde::{Deserialize, Serialize};

use crate::event::DomainEvent;

use super::{OrderNumber, OrderStatus, PaymentMethod, StockRelease};

/// Events raised by the order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed from a cart snapshot.
    OrderPlaced(OrderPlacedData),

    /// Order moved to Confirmed, Processing or Shipped.
    OrderStatusChanged(OrderStatusChangedData),

    /// Order reached the customer.
    OrderDelivered(OrderDeliveredData),

    /// Order was cancelled and its stock released.
    OrderCancelled(OrderCancelledData),

    /// Payment was captured.
    PaymentSucceeded(PaymentSucceededData),

    /// A payment attempt failed.
    PaymentFailed(PaymentFailedData),

    /// A captured payment was refunded.
    PaymentRefunded(PaymentRefundedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderStatusChanged(_) => "OrderStatusChanged",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            OrderEvent::PaymentFailed(_) => "PaymentFailed",
            OrderEvent::PaymentRefunded(_) => "PaymentRefunded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub order_number: OrderNumber,
    pub total: Money,
    pub item_count: usize,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub from: OrderStatus,
    pub to: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub order_number: OrderNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub order_id: OrderId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub order_number: OrderNumber,

    /// Status the order was cancelled from.
    pub from: OrderStatus,

    pub reason: String,

    /// Stock returned to inventory, one entry per line item.
    pub released: Vec<StockRelease>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub order_id: OrderId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub order_id: OrderId,
    pub transaction_id: String,
    pub amount: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = OrderEvent::PaymentFailed(PaymentFailedData {
            order_id: OrderId::new(),
            error: "card declined".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PaymentFailed");
        assert_eq!(json["data"]["error"], "card declined");

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_event_type() {
        let event = OrderEvent::PaymentRefunded(PaymentRefundedData {
            order_id: OrderId::new(),
            transaction_id: "txn".to_string(),
            amount: Money::zero(Currency::usd()),
        });
        assert_eq!(event.event_type(), "PaymentRefunded");
    }
}

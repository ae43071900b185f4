//! Order aggregate and related types.

mod aggregate;
mod events;
mod status;
mod value_objects;

pub use aggregate::{NewOrder, Order};
pub use events::{
    OrderCancelledData, OrderDeliveredData, OrderEvent, OrderPlacedData, OrderStatusChangedData,
    PaymentFailedData, PaymentRefundedData, PaymentSucceededData,
};
pub use status::{OrderStatus, PaymentMethod, PaymentStatus};
pub use value_objects::{
    DeliveryAddress, MerchantNote, OrderItem, OrderLine, OrderNumber, PaymentInfo, StatusChange,
    StockRelease,
};

use common::{Money, MoneyError, ProductId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// An order must contain at least one item.
    #[error("Order has no items")]
    EmptyOrder,

    /// A line was requested with a zero quantity.
    #[error("Invalid quantity {quantity} for product {product_id} (must be greater than 0)")]
    InvalidQuantity {
        product_id: ProductId,
        quantity: u32,
    },

    /// A line was priced below zero.
    #[error("Invalid price {price} for product {product_id}")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// A required address field is blank.
    #[error("Invalid delivery address: {field} is required")]
    InvalidAddress { field: &'static str },

    /// Order numbers must not be blank.
    #[error("Order number must not be blank")]
    InvalidOrderNumber,

    /// The requested status change is not permitted from the current status.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// The requested payment change is not permitted from the current payment status.
    #[error("Invalid payment transition: cannot {action} while payment is {current}")]
    InvalidPaymentTransition {
        current: PaymentStatus,
        action: &'static str,
    },

    /// Cancelling requires a reason.
    #[error("A cancellation reason is required")]
    CancellationReasonRequired,

    /// A successful payment must carry the processor's transaction id.
    #[error("A transaction id is required to record a payment")]
    TransactionIdRequired,

    /// Refund was requested for an order with no captured transaction.
    #[error("Order has no payment transaction to refund")]
    NoTransaction,

    /// Merchant notes must not be blank.
    #[error("Merchant note must not be blank")]
    EmptyNote,

    /// Pricing arithmetic failed (mixed currencies or overflow).
    #[error("Pricing error: {0}")]
    Money(#[from] MoneyError),
}

//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, StoreId, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, EventBuffer};

use super::{
    DeliveryAddress, MerchantNote, OrderError, OrderEvent, OrderItem, OrderLine, OrderNumber,
    OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, StatusChange, StockRelease,
    events::{
        OrderCancelledData, OrderDeliveredData, OrderPlacedData, OrderStatusChangedData,
        PaymentFailedData, PaymentRefundedData, PaymentSucceededData,
    },
};

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: OrderId,
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub order_number: OrderNumber,
    pub lines: Vec<OrderLine>,
    pub delivery_fee: Money,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub customer_notes: Option<String>,
}

/// Order aggregate root.
///
/// Created once by [`Order::place`] and afterwards mutated only through its
/// transition methods. Orders are never deleted; they end in `Delivered` or
/// `Cancelled`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    store_id: StoreId,
    customer_id: CustomerId,
    order_number: OrderNumber,
    status: OrderStatus,
    payment: PaymentInfo,
    subtotal: Money,
    delivery_fee: Money,
    total: Money,
    items: Vec<OrderItem>,
    delivery_address: DeliveryAddress,
    customer_notes: Option<String>,
    merchant_notes: Vec<MerchantNote>,
    tracking_number: Option<String>,
    status_history: Vec<StatusChange>,
    placed_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Persisted version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    #[serde(skip)]
    events: EventBuffer,
}

impl AggregateRoot for Order {
    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn aggregate_id(&self) -> Uuid {
        self.id.as_uuid()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn events(&self) -> &EventBuffer {
        &self.events
    }

    fn events_mut(&mut self) -> &mut EventBuffer {
        &mut self.events
    }
}

// Query methods
impl Order {
    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn order_number(&self) -> &OrderNumber {
        &self.order_number
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment(&self) -> &PaymentInfo {
        &self.payment
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }

    pub fn delivery_fee(&self) -> Money {
        self.delivery_fee
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn delivery_address(&self) -> &DeliveryAddress {
        &self.delivery_address
    }

    pub fn customer_notes(&self) -> Option<&str> {
        self.customer_notes.as_deref()
    }

    pub fn merchant_notes(&self) -> &[MerchantNote] {
        &self.merchant_notes
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.tracking_number.as_deref()
    }

    /// Returns the append-only status history, oldest first.
    pub fn status_history(&self) -> &[StatusChange] {
        &self.status_history
    }

    pub fn placed_at(&self) -> DateTime<Utc> {
        self.placed_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Total quantity across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }
}

// Command methods
impl Order {
    /// Places a new order in `Pending` status.
    ///
    /// Validates the lines and address, snapshots every line and computes
    /// `total = subtotal + delivery_fee` once. Records the initial history
    /// entry and raises `OrderPlaced`.
    pub fn place(new: NewOrder) -> Result<Self, OrderError> {
        if new.lines.is_empty() {
            return Err(OrderError::EmptyOrder);
        }
        new.delivery_address.validate()?;

        let items = new
            .lines
            .into_iter()
            .map(OrderItem::from_line)
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = items.iter().try_fold(
            Money::zero(new.delivery_fee.currency()),
            |acc, item| acc.checked_add(item.line_total),
        )?;
        let total = subtotal.checked_add(new.delivery_fee)?;

        let now = Utc::now();
        let customer_notes = new.customer_notes.filter(|notes| !notes.trim().is_empty());

        let mut order = Self {
            id: new.id,
            store_id: new.store_id,
            customer_id: new.customer_id,
            order_number: new.order_number,
            status: OrderStatus::Pending,
            payment: PaymentInfo::new(new.payment_method),
            subtotal,
            delivery_fee: new.delivery_fee,
            total,
            items,
            delivery_address: new.delivery_address,
            customer_notes,
            merchant_notes: Vec::new(),
            tracking_number: None,
            status_history: vec![StatusChange {
                from: None,
                to: OrderStatus::Pending,
                changed_at: now,
                notes: None,
            }],
            placed_at: now,
            updated_at: now,
            version: Version::initial(),
            events: EventBuffer::new(),
        };

        let placed = OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: order.id,
            store_id: order.store_id,
            customer_id: order.customer_id,
            order_number: order.order_number.clone(),
            total: order.total,
            item_count: order.items.len(),
            payment_method: new.payment_method,
        });
        order.record(placed);

        Ok(order)
    }

    /// Merchant accepts the order.
    pub fn confirm(&mut self) -> Result<(), OrderError> {
        self.advance(OrderStatus::Confirmed, None)
    }

    /// Order preparation starts.
    pub fn start_processing(&mut self) -> Result<(), OrderError> {
        self.advance(OrderStatus::Processing, None)
    }

    /// Order is handed to the carrier.
    pub fn ship(&mut self, tracking_number: Option<String>) -> Result<(), OrderError> {
        let notes = tracking_number
            .as_ref()
            .map(|tracking| format!("Tracking number: {tracking}"));
        self.advance(OrderStatus::Shipped, notes)?;
        self.tracking_number = tracking_number;
        Ok(())
    }

    /// Order reaches the customer.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Delivered, None)?;
        let delivered = OrderEvent::OrderDelivered(OrderDeliveredData {
            order_id: self.id,
            store_id: self.store_id,
            customer_id: self.customer_id,
            order_number: self.order_number.clone(),
        });
        self.record(delivered);
        Ok(())
    }

    /// Cancels the order.
    ///
    /// Returns one [`StockRelease`] per line item. The caller must apply every
    /// release to inventory within the same unit of work.
    #[must_use = "cancelled stock must be released to inventory"]
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<Vec<StockRelease>, OrderError> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(OrderError::CancellationReasonRequired);
        }

        let from = self.status;
        self.transition(OrderStatus::Cancelled, Some(reason.clone()))?;

        let released: Vec<StockRelease> = self
            .items
            .iter()
            .map(|item| StockRelease {
                product_id: item.product_id,
                variant_id: item.variant_id,
                quantity: item.quantity,
            })
            .collect();

        let cancelled = OrderEvent::OrderCancelled(OrderCancelledData {
            order_id: self.id,
            store_id: self.store_id,
            customer_id: self.customer_id,
            order_number: self.order_number.clone(),
            from,
            reason,
            released: released.clone(),
        });
        self.record(cancelled);

        Ok(released)
    }

    /// Checks that a payment may be attempted: the order is not cancelled and
    /// payment is Pending or Failed.
    pub fn ensure_payable(&self) -> Result<(), OrderError> {
        if self.status == OrderStatus::Cancelled || !self.payment.status.can_pay() {
            return Err(OrderError::InvalidPaymentTransition {
                current: self.payment.status,
                action: "process payment",
            });
        }
        Ok(())
    }

    /// Returns the transaction a refund would reverse.
    pub fn refundable_transaction(&self) -> Result<&str, OrderError> {
        let transaction_id = self
            .payment
            .transaction_id
            .as_deref()
            .ok_or(OrderError::NoTransaction)?;
        if !self.payment.status.can_refund() {
            return Err(OrderError::InvalidPaymentTransition {
                current: self.payment.status,
                action: "refund",
            });
        }
        Ok(transaction_id)
    }

    /// Records a successful payment from the processor.
    pub fn process_payment(&mut self, transaction_id: impl Into<String>) -> Result<(), OrderError> {
        let transaction_id = transaction_id.into();
        self.ensure_payable()?;
        if transaction_id.trim().is_empty() {
            return Err(OrderError::TransactionIdRequired);
        }

        let now = Utc::now();
        self.payment.status = PaymentStatus::Paid;
        self.payment.transaction_id = Some(transaction_id.clone());
        self.payment.paid_at = Some(now);
        self.payment.last_error = None;
        self.updated_at = now;

        let succeeded = OrderEvent::PaymentSucceeded(PaymentSucceededData {
            order_id: self.id,
            transaction_id,
            amount: self.total,
        });
        self.record(succeeded);
        Ok(())
    }

    /// Records a failed payment attempt. The order status is unaffected so
    /// the payment can be retried.
    pub fn fail_payment(&mut self, error: impl Into<String>) -> Result<(), OrderError> {
        if !self.payment.status.can_pay() {
            return Err(OrderError::InvalidPaymentTransition {
                current: self.payment.status,
                action: "record failed payment",
            });
        }

        let error = error.into();
        self.payment.status = PaymentStatus::Failed;
        self.payment.last_error = Some(error.clone());
        self.updated_at = Utc::now();

        let failed = OrderEvent::PaymentFailed(PaymentFailedData {
            order_id: self.id,
            error,
        });
        self.record(failed);
        Ok(())
    }

    /// Marks a captured payment as refunded.
    pub fn refund(&mut self) -> Result<(), OrderError> {
        let transaction_id = self.refundable_transaction()?.to_string();

        let now = Utc::now();
        self.payment.status = PaymentStatus::Refunded;
        self.payment.refunded_at = Some(now);
        self.updated_at = now;

        let refunded = OrderEvent::PaymentRefunded(PaymentRefundedData {
            order_id: self.id,
            transaction_id,
            amount: self.total,
        });
        self.record(refunded);
        Ok(())
    }

    /// Appends a merchant note.
    pub fn add_merchant_note(&mut self, text: impl Into<String>) -> Result<(), OrderError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(OrderError::EmptyNote);
        }
        let now = Utc::now();
        self.merchant_notes.push(MerchantNote { text, added_at: now });
        self.updated_at = now;
        Ok(())
    }
}

// Transition helpers
impl Order {
    fn advance(&mut self, to: OrderStatus, notes: Option<String>) -> Result<(), OrderError> {
        let from = self.status;
        self.transition(to, notes)?;
        let changed = OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            order_id: self.id,
            store_id: self.store_id,
            from,
            to,
        });
        self.record(changed);
        Ok(())
    }

    fn transition(&mut self, to: OrderStatus, notes: Option<String>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        self.status_history.push(StatusChange {
            from: Some(self.status),
            to,
            changed_at: now,
            notes,
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    fn record(&mut self, event: OrderEvent) {
        self.events
            .record(Self::aggregate_type(), self.id.as_uuid(), event);
    }
}

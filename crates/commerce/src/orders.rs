//! Order use cases: placement, lifecycle transitions, cancellation and payment.

use std::sync::Arc;

use common::{CustomerId, Money, OrderId, ProductId, StoreId};
use domain::{
    CartLine, DeliveryAddress, MovementType, NewOrder, Order, OrderError, OrderLine,
    PaymentMethod, Product,
};
use handlers::EventPublisher;
use store::{CommerceStore, StoreError};

use crate::allocator::OrderNumberAllocator;
use crate::cancellation::CancellationToken;
use crate::config::CommerceConfig;
use crate::payment::{PaymentOutcome, PaymentProcessor};
use crate::unit_of_work::{UnitOfWork, with_conflict_retries};
use crate::{CommerceError, Result};

/// Input for [`OrderService::place_order`]: a snapshot of the cart at checkout.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub store_id: StoreId,
    pub customer_id: CustomerId,
    pub lines: Vec<CartLine>,
    pub delivery_address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    /// Defaults to zero in the configured currency.
    pub delivery_fee: Option<Money>,
    pub customer_notes: Option<String>,
}

/// The order after a payment request, and what the processor answered.
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub order: Order,
    pub outcome: PaymentOutcome,
}

/// Order use cases.
///
/// Every method runs as one unit of work: load, mutate through the
/// aggregates, commit, then publish. A concurrency conflict re-runs the
/// whole unit of work up to `conflict_retries` times.
#[derive(Clone)]
pub struct OrderService<S> {
    store: S,
    publisher: Arc<dyn EventPublisher>,
    payments: Arc<dyn PaymentProcessor>,
    allocator: Arc<OrderNumberAllocator>,
    config: CommerceConfig,
}

impl<S> OrderService<S>
where
    S: CommerceStore + Clone + 'static,
{
    pub fn new(
        store: S,
        publisher: Arc<dyn EventPublisher>,
        payments: Arc<dyn PaymentProcessor>,
        config: CommerceConfig,
    ) -> Self {
        let allocator = Arc::new(OrderNumberAllocator::new(
            config.order_number_prefix.clone(),
            config.order_number_max_attempts,
        ));
        Self {
            store,
            publisher,
            payments,
            allocator,
            config,
        }
    }

    /// Returns the allocator shared by every placement on this service.
    pub fn allocator(&self) -> &OrderNumberAllocator {
        &self.allocator
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    /// Places an order and reserves stock for every line.
    ///
    /// Either the order and every reservation are committed together or
    /// nothing is. An order number already taken at commit time is replaced
    /// by a freshly allocated one.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(store_id = %request.store_id, customer_id = %request.customer_id)
    )]
    pub async fn place_order(
        &self,
        request: PlaceOrder,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let mut collisions = 0;
        let mut conflicts = 0;
        loop {
            match self.try_place_order(&request, cancel).await {
                Ok(order) => {
                    metrics::counter!("orders_placed_total").increment(1);
                    tracing::info!(
                        order_id = %order.id(),
                        order_number = %order.order_number(),
                        total = %order.total(),
                        "order placed"
                    );
                    return Ok(order);
                }
                Err(CommerceError::Store(StoreError::DuplicateOrderNumber {
                    order_number, ..
                })) if collisions < self.config.order_number_max_attempts => {
                    collisions += 1;
                    metrics::counter!("order_number_collisions_total").increment(1);
                    tracing::warn!(%order_number, "order number taken at commit, re-allocating");
                }
                Err(e) if e.is_retryable() && conflicts < self.config.conflict_retries => {
                    conflicts += 1;
                    metrics::counter!("unit_of_work_retries_total", "operation" => "place_order")
                        .increment(1);
                    tracing::warn!(error = %e, "conflict placing order, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_place_order(
        &self,
        request: &PlaceOrder,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        if request.lines.is_empty() {
            return Err(OrderError::EmptyOrder.into());
        }

        let mut products = Vec::new();
        let mut lines = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            let index = self
                .product_slot(&mut products, request.store_id, line.product_id)
                .await?;
            let product = &products[index];
            lines.push(OrderLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name: product.line_name(line.variant_id)?,
                unit_price: product.price_for(line.variant_id)?,
                quantity: line.quantity,
            });
        }

        let reservation = self
            .allocator
            .allocate(&self.store, request.store_id)
            .await?;

        let order = Order::place(NewOrder {
            id: OrderId::new(),
            store_id: request.store_id,
            customer_id: request.customer_id,
            order_number: reservation.number().clone(),
            lines,
            delivery_fee: request
                .delivery_fee
                .unwrap_or_else(|| Money::zero(self.config.default_currency)),
            delivery_address: request.delivery_address.clone(),
            payment_method: request.payment_method,
            customer_notes: request.customer_notes.clone(),
        });
        let outcome = match order {
            Ok(order) => self.reserve_and_commit(order, products, cancel).await,
            Err(e) => Err(e.into()),
        };
        drop(reservation);
        outcome
    }

    async fn reserve_and_commit(
        &self,
        order: Order,
        mut products: Vec<Product>,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let order_id = order.id();
        let reason = format!("Order {}", order.order_number());
        for item in order.items() {
            let product = products
                .iter_mut()
                .find(|product| product.id() == item.product_id)
                .ok_or(CommerceError::ProductNotFound(item.product_id))?;
            product.adjust_inventory(
                item.variant_id,
                -i64::from(item.quantity),
                MovementType::Sale,
                reason.clone(),
                Some(order_id),
            )?;
        }

        let mut uow = UnitOfWork::begin(self.store.clone(), cancel.clone());
        uow.track_order(order);
        for product in products {
            uow.track_product(product);
        }
        uow.commit(self.publisher.as_ref())
            .await?
            .into_order()
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn confirm_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        with_conflict_retries("confirm_order", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, Order::confirm)
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn process_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        with_conflict_retries("process_order", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, Order::start_processing)
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn ship_order(
        &self,
        order_id: OrderId,
        tracking_number: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        with_conflict_retries("ship_order", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, |order| {
                order.ship(tracking_number.clone())
            })
        })
        .await
    }

    #[tracing::instrument(skip(self, cancel))]
    pub async fn deliver_order(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        with_conflict_retries("deliver_order", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, Order::deliver)
        })
        .await
    }

    /// Cancels an order and returns its reserved stock to inventory, one
    /// `Return` movement per line, in the same commit.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let order = with_conflict_retries("cancel_order", self.config.conflict_retries, || {
            self.try_cancel_order(order_id, reason, cancel)
        })
        .await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(order_number = %order.order_number(), reason, "order cancelled");
        Ok(order)
    }

    async fn try_cancel_order(
        &self,
        order_id: OrderId,
        reason: &str,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let mut order = self.get_order(order_id).await?;
        let releases = order.cancel(reason)?;

        let note = format!("Order {} cancelled", order.order_number());
        let mut products = Vec::new();
        for release in releases {
            let index = self
                .product_slot(&mut products, order.store_id(), release.product_id)
                .await?;
            products[index].adjust_inventory(
                release.variant_id,
                i64::from(release.quantity),
                MovementType::Return,
                note.clone(),
                Some(order_id),
            )?;
        }

        let mut uow = UnitOfWork::begin(self.store.clone(), cancel.clone());
        uow.track_order(order);
        for product in products {
            uow.track_product(product);
        }
        uow.commit(self.publisher.as_ref())
            .await?
            .into_order()
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    /// Charges the order total and records the outcome on the order.
    ///
    /// A declined charge is not an error: the order's payment becomes
    /// `Failed` and the call may be repeated. The order id is the
    /// processor's idempotency key. An approved charge that cannot be
    /// recorded is refunded unless the order already carries that same
    /// transaction.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn process_payment(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<PaymentResult> {
        let order = self.get_order(order_id).await?;
        order.ensure_payable()?;
        if cancel.is_cancelled() {
            return Err(CommerceError::Cancelled);
        }

        let amount = order.total();
        let outcome = self
            .payments
            .process(order_id, amount, order.payment().method)
            .await
            .map_err(|e| CommerceError::PaymentProcessor(e.to_string()))?;

        let applied = with_conflict_retries("process_payment", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, |order| match &outcome {
                PaymentOutcome::Approved { transaction_id } => {
                    order.process_payment(transaction_id.as_str())
                }
                PaymentOutcome::Declined { reason } => order.fail_payment(reason.as_str()),
            })
        })
        .await;
        let order = match (applied, &outcome) {
            (Ok(order), _) => order,
            (Err(e), PaymentOutcome::Approved { transaction_id }) => {
                self.settle_unrecorded_capture(order_id, transaction_id, amount, e)
                    .await?
            }
            (Err(e), PaymentOutcome::Declined { .. }) => return Err(e),
        };

        match &outcome {
            PaymentOutcome::Approved { transaction_id } => {
                tracing::info!(%transaction_id, amount = %order.total(), "payment captured");
            }
            PaymentOutcome::Declined { reason } => {
                metrics::counter!("payments_declined_total").increment(1);
                tracing::warn!(%reason, "payment declined");
            }
        }
        Ok(PaymentResult { order, outcome })
    }

    /// Resolves an approved charge whose recording failed with `cause`.
    ///
    /// Returns the order when it already holds this transaction (a repeat
    /// charge for the same order won the race). Otherwise refunds the
    /// capture and returns `cause`.
    async fn settle_unrecorded_capture(
        &self,
        order_id: OrderId,
        transaction_id: &str,
        amount: Money,
        cause: CommerceError,
    ) -> Result<Order> {
        let current = match self.get_order(order_id).await {
            Ok(order) => order,
            Err(e) => {
                metrics::counter!("payment_compensations_total", "outcome" => "unreconciled")
                    .increment(1);
                tracing::error!(%transaction_id, error = %e, "captured payment could not be reconciled");
                return Err(cause);
            }
        };
        if current.payment().transaction_id.as_deref() == Some(transaction_id) {
            tracing::info!(%transaction_id, "payment already recorded for this transaction");
            return Ok(current);
        }

        match self.payments.refund(order_id, transaction_id, amount).await {
            Ok(PaymentOutcome::Approved { .. }) => {
                metrics::counter!("payment_compensations_total", "outcome" => "refunded")
                    .increment(1);
                tracing::warn!(%transaction_id, %amount, error = %cause, "unrecorded capture refunded");
            }
            Ok(PaymentOutcome::Declined { reason }) => {
                metrics::counter!("payment_compensations_total", "outcome" => "failed").increment(1);
                tracing::error!(%transaction_id, %reason, "refund of unrecorded capture declined");
            }
            Err(e) => {
                metrics::counter!("payment_compensations_total", "outcome" => "failed").increment(1);
                tracing::error!(%transaction_id, error = %e, "refund of unrecorded capture failed");
            }
        }
        Err(cause)
    }

    /// Refunds the captured payment. A refund the processor declines leaves
    /// the order unchanged.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn refund_payment(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
    ) -> Result<PaymentResult> {
        let order = self.get_order(order_id).await?;
        let transaction_id = order.refundable_transaction()?.to_string();
        if cancel.is_cancelled() {
            return Err(CommerceError::Cancelled);
        }

        let outcome = self
            .payments
            .refund(order_id, &transaction_id, order.total())
            .await
            .map_err(|e| CommerceError::PaymentProcessor(e.to_string()))?;

        if let PaymentOutcome::Declined { reason } = &outcome {
            tracing::warn!(%transaction_id, %reason, "refund declined");
            return Ok(PaymentResult { order, outcome });
        }

        let order = with_conflict_retries("refund_payment", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, Order::refund)
        })
        .await?;
        tracing::info!(%transaction_id, amount = %order.total(), "payment refunded");
        Ok(PaymentResult { order, outcome })
    }

    #[tracing::instrument(skip(self, text, cancel))]
    pub async fn add_merchant_note(
        &self,
        order_id: OrderId,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        with_conflict_retries("add_merchant_note", self.config.conflict_retries, || {
            self.update_order(order_id, cancel, |order| order.add_merchant_note(text))
        })
        .await
    }

    async fn update_order<F>(
        &self,
        order_id: OrderId,
        cancel: &CancellationToken,
        apply: F,
    ) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> std::result::Result<(), OrderError>,
    {
        let mut order = self.get_order(order_id).await?;
        apply(&mut order)?;

        let mut uow = UnitOfWork::begin(self.store.clone(), cancel.clone());
        uow.track_order(order);
        uow.commit(self.publisher.as_ref())
            .await?
            .into_order()
            .ok_or(CommerceError::OrderNotFound(order_id))
    }

    /// Index of `product_id` in `products`, loading it on first use. Products
    /// of another store are reported as missing.
    async fn product_slot(
        &self,
        products: &mut Vec<Product>,
        store_id: StoreId,
        product_id: ProductId,
    ) -> Result<usize> {
        if let Some(index) = products.iter().position(|p| p.id() == product_id) {
            return Ok(index);
        }
        let product = self
            .store
            .get_product(product_id)
            .await?
            .filter(|product| product.store_id() == store_id)
            .ok_or(CommerceError::ProductNotFound(product_id))?;
        products.push(product);
        Ok(products.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;
    use domain::{AggregateRoot, OrderStatus, PaymentStatus, StockLevel};
    use handlers::NullPublisher;
    use store::{ChangeSet, CommerceStoreExt, InMemoryStore};

    use std::time::Duration;

    use crate::payment::{InMemoryPaymentProcessor, ProcessorError};

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::usd())
    }

    struct Fixture {
        store: InMemoryStore,
        service: OrderService<InMemoryStore>,
        payments: InMemoryPaymentProcessor,
        store_id: StoreId,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let payments = InMemoryPaymentProcessor::new();
        let service = OrderService::new(
            store.clone(),
            Arc::new(NullPublisher),
            Arc::new(payments.clone()),
            CommerceConfig::default(),
        );
        Fixture {
            store,
            service,
            payments,
            store_id: StoreId::new(),
        }
    }

    impl Fixture {
        async fn product(&self, price: i64, quantity: i64) -> ProductId {
            let mut product =
                Product::new(self.store_id, "Kettle", usd(price), StockLevel::default());
            product
                .adjust_inventory(None, quantity, MovementType::Initial, "Initial stock", None)
                .unwrap();
            let product_id = product.id();
            self.store
                .commit(ChangeSet::new().with_product(product))
                .await
                .unwrap();
            product_id
        }

        fn request(&self, lines: Vec<CartLine>) -> PlaceOrder {
            PlaceOrder {
                store_id: self.store_id,
                customer_id: CustomerId::new(),
                lines,
                delivery_address: DeliveryAddress::new("Ana", "1 Main St", "Springfield", "US"),
                payment_method: PaymentMethod::Card,
                delivery_fee: Some(usd(500)),
                customer_notes: None,
            }
        }

        async fn placed(&self) -> Order {
            let product_id = self.product(2000, 10).await;
            let request = self.request(vec![CartLine::new(product_id, None, 1)]);
            self.service
                .place_order(request, &CancellationToken::new())
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_place_order_reserves_stock() {
        let fx = fixture();
        let product_id = fx.product(1000, 10).await;

        let order = fx
            .service
            .place_order(
                fx.request(vec![CartLine::new(product_id, None, 2)]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(order.subtotal(), usd(2000));
        assert_eq!(order.total(), usd(2500));
        assert_eq!(order.status(), OrderStatus::Pending);
        assert!(order.order_number().as_str().starts_with("ORD-"));
        assert_eq!(fx.store.replay_stock(product_id, None).await.unwrap(), 8);
        assert_eq!(fx.service.allocator().in_flight(fx.store_id), 0);
    }

    #[tokio::test]
    async fn test_product_from_other_store_is_not_found() {
        let fx = fixture();
        let product_id = fx.product(1000, 10).await;
        let mut request = fx.request(vec![CartLine::new(product_id, None, 1)]);
        request.store_id = StoreId::new();

        let err = fx
            .service
            .place_order(request, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::ProductNotFound(id) if id == product_id));
    }

    #[tokio::test]
    async fn test_empty_order_is_rejected() {
        let fx = fixture();
        let err = fx
            .service
            .place_order(fx.request(Vec::new()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "empty_order");
        assert_eq!(fx.store.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_lifecycle_through_delivery() {
        let fx = fixture();
        let order = fx.placed().await;
        let cancel = CancellationToken::new();

        fx.service.confirm_order(order.id(), &cancel).await.unwrap();
        fx.service.process_order(order.id(), &cancel).await.unwrap();
        fx.service
            .ship_order(order.id(), Some("1Z999".to_string()), &cancel)
            .await
            .unwrap();
        let delivered = fx.service.deliver_order(order.id(), &cancel).await.unwrap();

        assert_eq!(delivered.status(), OrderStatus::Delivered);
        assert_eq!(delivered.tracking_number(), Some("1Z999"));
        assert_eq!(delivered.status_history().len(), 5);

        let err = fx
            .service
            .cancel_order(order.id(), "too late", &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid_transition");
    }

    #[tokio::test]
    async fn test_ship_requires_processing() {
        let fx = fixture();
        let order = fx.placed().await;
        let err = fx
            .service
            .ship_order(order.id(), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommerceError::Order(OrderError::InvalidStatusTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_declined_payment_can_be_retried() {
        let fx = fixture();
        let order = fx.placed().await;
        let cancel = CancellationToken::new();

        fx.payments.decline_next("card declined").await;
        let declined = fx
            .service
            .process_payment(order.id(), &cancel)
            .await
            .unwrap();
        assert!(!declined.outcome.is_approved());
        assert_eq!(declined.order.payment().status, PaymentStatus::Failed);
        assert_eq!(declined.order.status(), OrderStatus::Pending);

        let paid = fx
            .service
            .process_payment(order.id(), &cancel)
            .await
            .unwrap();
        assert!(paid.outcome.is_approved());
        assert_eq!(paid.order.payment().status, PaymentStatus::Paid);
        assert!(paid.order.payment().paid_at.is_some());

        let refunded = fx.service.refund_payment(order.id(), &cancel).await.unwrap();
        assert_eq!(refunded.order.payment().status, PaymentStatus::Refunded);
        assert_eq!(fx.payments.captured_count().await, 0);
    }

    #[tokio::test]
    async fn test_refund_without_transaction() {
        let fx = fixture();
        let order = fx.placed().await;
        let err = fx
            .service
            .refund_payment(order.id(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Order(OrderError::NoTransaction)));
    }

    #[tokio::test]
    async fn test_processor_outage_leaves_order_untouched() {
        let fx = fixture();
        let order = fx.placed().await;
        fx.payments.set_unavailable(true).await;

        let err = fx
            .service
            .process_payment(order.id(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "payment_failed");

        let reloaded = fx.service.get_order(order.id()).await.unwrap();
        assert_eq!(reloaded.payment().status, PaymentStatus::Pending);
        assert_eq!(reloaded.version(), order.version());
    }

    /// Answers only after a delay, once the inner processor has captured.
    struct SlowProcessor {
        inner: InMemoryPaymentProcessor,
        delay: Duration,
    }

    #[async_trait::async_trait]
    impl PaymentProcessor for SlowProcessor {
        async fn process(
            &self,
            order_id: OrderId,
            amount: Money,
            method: PaymentMethod,
        ) -> std::result::Result<PaymentOutcome, ProcessorError> {
            let outcome = self.inner.process(order_id, amount, method).await;
            tokio::time::sleep(self.delay).await;
            outcome
        }

        async fn refund(
            &self,
            order_id: OrderId,
            transaction_id: &str,
            amount: Money,
        ) -> std::result::Result<PaymentOutcome, ProcessorError> {
            self.inner.refund(order_id, transaction_id, amount).await
        }
    }

    #[tokio::test]
    async fn test_overlapping_payments_capture_once() {
        let fx = fixture();
        let order = fx.placed().await;
        let slow = OrderService::new(
            fx.store.clone(),
            Arc::new(NullPublisher),
            Arc::new(SlowProcessor {
                inner: fx.payments.clone(),
                delay: Duration::from_millis(50),
            }),
            CommerceConfig::default(),
        );
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(
            slow.process_payment(order.id(), &cancel),
            slow.process_payment(order.id(), &cancel)
        );
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.outcome, second.outcome);
        assert_eq!(fx.payments.captured_count().await, 1);
        let reloaded = fx.service.get_order(order.id()).await.unwrap();
        assert_eq!(reloaded.payment().status, PaymentStatus::Paid);
        assert_eq!(
            reloaded.payment().transaction_id.as_deref(),
            Some("TXN-000001")
        );
    }

    #[tokio::test]
    async fn test_unrecorded_capture_is_refunded() {
        let fx = fixture();
        let order = fx.placed().await;
        let cancel = CancellationToken::new();
        fx.store.fail_next_commit();

        let err = fx
            .service
            .process_payment(order.id(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Store(StoreError::Unavailable(_))));
        assert_eq!(fx.payments.captured_count().await, 0);
        let reloaded = fx.service.get_order(order.id()).await.unwrap();
        assert_eq!(reloaded.payment().status, PaymentStatus::Pending);
        assert!(reloaded.payment().transaction_id.is_none());

        let paid = fx.service.process_payment(order.id(), &cancel).await.unwrap();
        assert!(paid.outcome.is_approved());
        assert_eq!(fx.payments.captured_count().await, 1);
    }

    #[tokio::test]
    async fn test_merchant_note() {
        let fx = fixture();
        let order = fx.placed().await;
        let cancel = CancellationToken::new();

        let noted = fx
            .service
            .add_merchant_note(order.id(), "Gift wrap", &cancel)
            .await
            .unwrap();
        assert_eq!(noted.merchant_notes()[0].text, "Gift wrap");

        let err = fx
            .service
            .add_merchant_note(order.id(), "  ", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CommerceError::Order(OrderError::EmptyNote)));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let fx = fixture();
        let err = fx
            .service
            .confirm_order(OrderId::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
    }
}

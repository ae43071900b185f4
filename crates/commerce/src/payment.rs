//! Payment processor boundary and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, OrderId};
use domain::PaymentMethod;
use thiserror::Error;
use tokio::sync::Mutex;

/// The processor could not complete the request at all.
///
/// A declined charge is not an error; it is a [`PaymentOutcome::Declined`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProcessorError(pub String);

/// Result of a charge or refund request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

impl PaymentOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, PaymentOutcome::Approved { .. })
    }
}

/// External payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Charges the order total.
    ///
    /// `order_id` is the idempotency key: while an order has an unrefunded
    /// capture, charging it again returns that capture instead of a new one.
    async fn process(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, ProcessorError>;

    /// Refunds a captured transaction.
    async fn refund(
        &self,
        order_id: OrderId,
        transaction_id: &str,
        amount: Money,
    ) -> Result<PaymentOutcome, ProcessorError>;
}

#[derive(Debug, Default)]
struct ProcessorState {
    captured: HashMap<String, (OrderId, Money)>,
    next_id: u32,
    decline_next: Option<String>,
    unavailable: bool,
}

/// In-memory payment processor for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl InMemoryPaymentProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines the next charge with the given reason.
    pub async fn decline_next(&self, reason: impl Into<String>) {
        self.state.lock().await.decline_next = Some(reason.into());
    }

    /// Makes every request fail as if the processor were unreachable.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Returns the number of captured, unrefunded transactions.
    pub async fn captured_count(&self) -> usize {
        self.state.lock().await.captured.len()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn process(
        &self,
        order_id: OrderId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<PaymentOutcome, ProcessorError> {
        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(ProcessorError("processor unavailable".to_string()));
        }
        if let Some(transaction_id) = state
            .captured
            .iter()
            .find(|(_, (captured_order, _))| *captured_order == order_id)
            .map(|(transaction_id, _)| transaction_id.clone())
        {
            tracing::debug!(%order_id, %transaction_id, "repeat charge, returning existing capture");
            return Ok(PaymentOutcome::Approved { transaction_id });
        }
        if let Some(reason) = state.decline_next.take() {
            return Ok(PaymentOutcome::Declined { reason });
        }

        state.next_id += 1;
        let transaction_id = format!("TXN-{:06}", state.next_id);
        state
            .captured
            .insert(transaction_id.clone(), (order_id, amount));
        tracing::debug!(%order_id, %amount, ?method, %transaction_id, "payment captured");
        Ok(PaymentOutcome::Approved { transaction_id })
    }

    async fn refund(
        &self,
        order_id: OrderId,
        transaction_id: &str,
        amount: Money,
    ) -> Result<PaymentOutcome, ProcessorError> {
        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(ProcessorError("processor unavailable".to_string()));
        }

        match state.captured.get(transaction_id) {
            Some((captured_order, captured_amount))
                if *captured_order == order_id && *captured_amount == amount =>
            {
                state.captured.remove(transaction_id);
                Ok(PaymentOutcome::Approved {
                    transaction_id: transaction_id.to_string(),
                })
            }
            _ => Ok(PaymentOutcome::Declined {
                reason: format!("unknown transaction {transaction_id}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    fn usd(minor: i64) -> Money {
        Money::from_minor(minor, Currency::usd())
    }

    #[tokio::test]
    async fn test_charge_and_refund() {
        let processor = InMemoryPaymentProcessor::new();
        let order_id = OrderId::new();

        let outcome = processor
            .process(order_id, usd(2500), PaymentMethod::Card)
            .await
            .unwrap();
        let PaymentOutcome::Approved { transaction_id } = outcome else {
            panic!("expected approval");
        };
        assert_eq!(transaction_id, "TXN-000001");
        assert_eq!(processor.captured_count().await, 1);

        let refund = processor
            .refund(order_id, &transaction_id, usd(2500))
            .await
            .unwrap();
        assert!(refund.is_approved());
        assert_eq!(processor.captured_count().await, 0);
    }

    #[tokio::test]
    async fn test_decline_applies_once() {
        let processor = InMemoryPaymentProcessor::new();
        processor.decline_next("insufficient funds").await;

        let first = processor
            .process(OrderId::new(), usd(100), PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(
            first,
            PaymentOutcome::Declined {
                reason: "insufficient funds".to_string()
            }
        );

        let second = processor
            .process(OrderId::new(), usd(100), PaymentMethod::Card)
            .await
            .unwrap();
        assert!(second.is_approved());
    }

    #[tokio::test]
    async fn test_repeat_charge_returns_existing_capture() {
        let processor = InMemoryPaymentProcessor::new();
        let order_id = OrderId::new();

        let first = processor
            .process(order_id, usd(900), PaymentMethod::Card)
            .await
            .unwrap();
        let second = processor
            .process(order_id, usd(900), PaymentMethod::Card)
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(processor.captured_count().await, 1);

        let other = processor
            .process(OrderId::new(), usd(900), PaymentMethod::Card)
            .await
            .unwrap();
        assert_ne!(other, first);
        assert_eq!(processor.captured_count().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_refund_is_declined() {
        let processor = InMemoryPaymentProcessor::new();
        let outcome = processor
            .refund(OrderId::new(), "TXN-999999", usd(100))
            .await
            .unwrap();
        assert!(!outcome.is_approved());

        processor.set_unavailable(true).await;
        assert!(
            processor
                .process(OrderId::new(), usd(100), PaymentMethod::Card)
                .await
                .is_err()
        );
    }
}

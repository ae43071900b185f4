//! Use case error types and their stable client-facing codes.

use common::{CartId, OrderId, ProductId};
use domain::{CartError, InventoryError, OrderError};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

/// Errors returned by the commerce use cases.
#[derive(Debug, Error)]
pub enum CommerceError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Cart not found: {0}")]
    CartNotFound(CartId),

    /// Order rule violated.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// Stock rule violated.
    #[error("{0}")]
    Inventory(#[from] InventoryError),

    /// Cart rule violated.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// The payment processor could not be reached or failed internally.
    #[error("Payment processor error: {0}")]
    PaymentProcessor(String),

    /// Persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The caller cancelled the operation before its commit started.
    #[error("Operation cancelled")]
    Cancelled,
}

impl CommerceError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            CommerceError::OrderNotFound(_)
            | CommerceError::ProductNotFound(_)
            | CommerceError::CartNotFound(_)
            | CommerceError::Inventory(InventoryError::VariantNotFound { .. })
            | CommerceError::Cart(CartError::ItemNotFound { .. }) => "not_found",
            CommerceError::Order(err) => match err {
                OrderError::EmptyOrder => "empty_order",
                OrderError::InvalidQuantity { .. } => "invalid_quantity",
                OrderError::InvalidPrice { .. } | OrderError::Money(_) => "invalid_price",
                OrderError::InvalidAddress { .. } => "invalid_address",
                OrderError::InvalidStatusTransition { .. }
                | OrderError::InvalidPaymentTransition { .. }
                | OrderError::NoTransaction => "invalid_transition",
                OrderError::CancellationReasonRequired
                | OrderError::TransactionIdRequired
                | OrderError::EmptyNote
                | OrderError::InvalidOrderNumber => "validation_failed",
            },
            CommerceError::Inventory(InventoryError::InsufficientStock { .. }) => {
                "insufficient_stock"
            }
            CommerceError::Inventory(_) | CommerceError::Cart(_) => "invalid_quantity",
            CommerceError::PaymentProcessor(_) => "payment_failed",
            CommerceError::Store(err) if err.is_retryable() => "concurrency_conflict",
            CommerceError::Store(StoreError::DuplicateOrderNumber { .. }) => {
                "concurrency_conflict"
            }
            CommerceError::Store(_) => "internal",
            CommerceError::Cancelled => "cancelled",
        }
    }

    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommerceError::Store(err) if err.is_retryable())
    }

    /// Returns true for faults the caller cannot fix by changing its input.
    pub fn is_internal(&self) -> bool {
        self.code() == "internal"
    }

    /// Builds the `(code, message)` pair shown to clients.
    ///
    /// Infrastructure faults are logged here and reported with a generic
    /// message.
    pub fn to_response(&self) -> ErrorResponse {
        let message = if self.is_internal() {
            tracing::error!(error = %self, "internal commerce error");
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };
        ErrorResponse {
            code: self.code(),
            message,
        }
    }
}

/// Client-facing error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/// Convenience type alias for commerce results.
pub type Result<T> = std::result::Result<T, CommerceError>;

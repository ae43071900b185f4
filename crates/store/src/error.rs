use common::{ProductId, StoreId, VariantId, Version};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when loading or committing aggregates.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the aggregate was
    /// loaded at. Another writer committed first.
    #[error(
        "Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: Uuid,
        expected: Version,
        actual: Version,
    },

    /// The store already holds an order with this number.
    #[error("Order number {order_number} already exists in store {store_id}")]
    DuplicateOrderNumber {
        store_id: StoreId,
        order_number: String,
    },

    /// A new movement does not continue the persisted ledger chain.
    #[error(
        "Ledger conflict for product {product_id}: expected previous quantity {expected}, found {found}"
    )]
    LedgerConflict {
        product_id: ProductId,
        variant_id: Option<VariantId>,
        expected: i64,
        found: i64,
    },

    /// The persisted ledger does not replay cleanly.
    #[error("Corrupt ledger: {0}")]
    Ledger(#[from] domain::LedgerError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not accept the write.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::LedgerConflict { .. }
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let conflict = StoreError::ConcurrencyConflict {
            aggregate_type: "Product",
            aggregate_id: Uuid::new_v4(),
            expected: Version::new(1),
            actual: Version::new(2),
        };
        assert!(conflict.is_retryable());

        let ledger = StoreError::LedgerConflict {
            product_id: ProductId::new(),
            variant_id: None,
            expected: 3,
            found: 4,
        };
        assert!(ledger.is_retryable());

        let duplicate = StoreError::DuplicateOrderNumber {
            store_id: StoreId::new(),
            order_number: "ORD-1".to_string(),
        };
        assert!(!duplicate.is_retryable());
        assert!(!StoreError::Unavailable("down".to_string()).is_retryable());
    }
}

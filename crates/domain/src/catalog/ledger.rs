//! Inventory ledger replay and verification.
//!
//! The movement log is the system of record for stock. These functions
//! re-derive quantities from it and check that the denormalized quantity on
//! a product or variant agrees with the log.

use super::{InventoryMovement, LedgerError, StockLevel};

/// Replays movements from zero and returns the resulting quantity.
///
/// Every movement's `quantity_after` must equal the running total after its
/// change is applied; the first broken link is reported.
pub fn replay(movements: &[InventoryMovement]) -> Result<i64, LedgerError> {
    movements
        .iter()
        .enumerate()
        .try_fold(0i64, |running, (index, movement)| {
            let expected = running
                .checked_add(movement.quantity_change)
                .ok_or(LedgerError::Overflow { index })?;
            if movement.quantity_after != expected {
                return Err(LedgerError::ChainBroken {
                    index,
                    expected,
                    found: movement.quantity_after,
                });
            }
            Ok(expected)
        })
}

/// Checks that `level` equals the post-image of the last movement and that
/// the chain itself is intact.
pub fn verify_against(level: &StockLevel, movements: &[InventoryMovement]) -> Result<(), LedgerError> {
    let replayed = replay(movements)?;
    if replayed != level.quantity() {
        return Err(LedgerError::QuantityMismatch {
            recorded: level.quantity(),
            replayed,
        });
    }
    Ok(())
}

/// Returns true if `movement` continues a chain whose last post-image is
/// `previous_after` (zero when the chain is empty).
pub fn continues(previous_after: i64, movement: &InventoryMovement) -> bool {
    previous_after.checked_add(movement.quantity_change) == Some(movement.quantity_after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MovementType;
    use chrono::Utc;
    use common::{MovementId, ProductId};

    fn movement(change: i64, after: i64) -> InventoryMovement {
        InventoryMovement {
            id: MovementId::new(),
            product_id: ProductId::new(),
            variant_id: None,
            quantity_change: change,
            quantity_after: after,
            movement_type: MovementType::Adjustment,
            reason: "test".to_string(),
            order_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_replay_empty_log_is_zero() {
        assert_eq!(replay(&[]), Ok(0));
    }

    #[test]
    fn test_replay_sums_changes() {
        let log = [movement(10, 10), movement(-4, 6), movement(2, 8)];
        assert_eq!(replay(&log), Ok(8));
    }

    #[test]
    fn test_replay_reports_first_broken_link() {
        let log = [movement(10, 10), movement(-4, 7), movement(2, 9)];
        assert_eq!(
            replay(&log),
            Err(LedgerError::ChainBroken {
                index: 1,
                expected: 6,
                found: 7,
            })
        );
    }

    #[test]
    fn test_verify_against_detects_drift() {
        let log = [movement(5, 5)];
        let mut level = StockLevel::with_policy(false, None);
        assert_eq!(
            verify_against(&level, &log),
            Err(LedgerError::QuantityMismatch {
                recorded: 0,
                replayed: 5,
            })
        );

        level = serde_json::from_value(serde_json::json!({
            "quantity": 5,
            "allow_backorder": false,
            "low_stock_threshold": null
        }))
        .unwrap();
        assert_eq!(verify_against(&level, &log), Ok(()));
    }

    #[test]
    fn test_continues() {
        assert!(continues(0, &movement(3, 3)));
        assert!(continues(3, &movement(-1, 2)));
        assert!(!continues(3, &movement(-1, 3)));
    }
}

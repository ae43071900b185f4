//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use common::{Money, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus, PaymentMethod, PaymentStatus};

/// Human-readable order identifier, unique within a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Creates an order number, rejecting blank values.
    pub fn new(value: impl Into<String>) -> Result<Self, OrderError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(OrderError::InvalidOrderNumber);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requested line at placement time, already priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

/// Immutable snapshot of a purchased line.
///
/// Captured when the order is placed so later catalog edits never change
/// historical orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

impl OrderItem {
    /// Snapshots a line, computing its total.
    pub fn from_line(line: OrderLine) -> Result<Self, OrderError> {
        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        if line.unit_price.is_negative() {
            return Err(OrderError::InvalidPrice {
                product_id: line.product_id,
                price: line.unit_price,
            });
        }
        let line_total = line.unit_price.multiply(line.quantity)?;
        Ok(Self {
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name,
            unit_price: line.unit_price,
            quantity: line.quantity,
            line_total,
        })
    }
}

/// Where the order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: Option<String>,
    pub country: String,
    pub phone: Option<String>,
}

impl DeliveryAddress {
    /// Creates an address with the required fields only.
    pub fn new(
        recipient: impl Into<String>,
        line1: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            line1: line1.into(),
            line2: None,
            city: city.into(),
            region: None,
            postal_code: None,
            country: country.into(),
            phone: None,
        }
    }

    /// Rejects addresses with blank required fields.
    pub fn validate(&self) -> Result<(), OrderError> {
        let required = [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(OrderError::InvalidAddress { field });
            }
        }
        Ok(())
    }
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Status before the transition; `None` for the initial placement.
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A free-text note appended by the merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantNote {
    pub text: String,
    pub added_at: DateTime<Utc>,
}

/// Payment sub-state of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Message from the most recent failed attempt.
    pub last_error: Option<String>,
}

impl PaymentInfo {
    pub fn new(method: PaymentMethod) -> Self {
        Self {
            method,
            status: PaymentStatus::Pending,
            transaction_id: None,
            paid_at: None,
            refunded_at: None,
            last_error: None,
        }
    }
}

/// Stock that must be returned to inventory because an order was cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRelease {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    fn line(quantity: u32, price: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId::new(),
            variant_id: None,
            product_name: "Widget".to_string(),
            unit_price: Money::from_minor(price, Currency::usd()),
            quantity,
        }
    }

    #[test]
    fn test_order_number_rejects_blank() {
        assert!(matches!(
            OrderNumber::new(" "),
            Err(OrderError::InvalidOrderNumber)
        ));
        assert_eq!(OrderNumber::new("ORD-1").unwrap().as_str(), "ORD-1");
    }

    #[test]
    fn test_order_item_computes_line_total() {
        let item = OrderItem::from_line(line(3, 1000)).unwrap();
        assert_eq!(item.line_total.minor(), 3000);
    }

    #[test]
    fn test_order_item_rejects_zero_quantity() {
        assert!(matches!(
            OrderItem::from_line(line(0, 1000)),
            Err(OrderError::InvalidQuantity { quantity: 0, .. })
        ));
    }

    #[test]
    fn test_order_item_rejects_negative_price() {
        assert!(matches!(
            OrderItem::from_line(line(1, -1)),
            Err(OrderError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn test_address_validation() {
        let address = DeliveryAddress::new("Ana", "1 Main St", "Springfield", "US");
        assert!(address.validate().is_ok());

        let mut missing_city = address.clone();
        missing_city.city = "  ".to_string();
        assert!(matches!(
            missing_city.validate(),
            Err(OrderError::InvalidAddress { field: "city" })
        ));
    }
}

//! Product aggregate and its stock levels.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, StoreId, VariantId, Version};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::{AggregateRoot, EventBuffer};

use super::{
    InventoryError, InventoryMovement, MovementType, ProductEvent,
    events::{StockChangedData, VariantStockLowData},
};

/// Current stock of a product or variant together with its stock policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StockLevel {
    quantity: i64,
    allow_backorder: bool,
    low_stock_threshold: Option<i64>,
}

impl StockLevel {
    /// An empty stock level with the given policy.
    pub fn with_policy(allow_backorder: bool, low_stock_threshold: Option<i64>) -> Self {
        Self {
            quantity: 0,
            allow_backorder,
            low_stock_threshold,
        }
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn allow_backorder(&self) -> bool {
        self.allow_backorder
    }

    pub fn low_stock_threshold(&self) -> Option<i64> {
        self.low_stock_threshold
    }

    /// Returns true if the quantity sits below the low-stock threshold.
    pub fn is_low(&self) -> bool {
        self.low_stock_threshold
            .is_some_and(|threshold| self.quantity < threshold)
    }
}

/// A purchasable variant of a product (size, colour, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    name: String,
    sku: Option<String>,
    price_override: Option<Money>,
    stock: StockLevel,
}

impl Variant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: VariantId::new(),
            name: name.into(),
            sku: None,
            price_override: None,
            stock: StockLevel::default(),
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn with_price_override(mut self, price: Money) -> Self {
        self.price_override = Some(price);
        self
    }

    /// Sets the stock policy. Quantity always starts at zero and is only
    /// changed through [`Product::adjust_inventory`].
    pub fn with_stock_policy(mut self, allow_backorder: bool, low_stock_threshold: Option<i64>) -> Self {
        self.stock = StockLevel::with_policy(allow_backorder, low_stock_threshold);
        self
    }

    pub fn id(&self) -> VariantId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn price_override(&self) -> Option<Money> {
        self.price_override
    }

    pub fn stock(&self) -> &StockLevel {
        &self.stock
    }
}

/// Product aggregate root.
///
/// Owns the stock of the base product and of every variant. Quantities change
/// only through [`Product::adjust_inventory`], which appends the matching
/// ledger movement in the same call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    store_id: StoreId,
    name: String,
    unit_price: Money,
    stock: StockLevel,
    variants: BTreeMap<VariantId, Variant>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    #[serde(default)]
    version: Version,

    /// Movements appended since the product was loaded, not yet persisted.
    #[serde(skip)]
    pending_movements: Vec<InventoryMovement>,

    #[serde(skip)]
    events: EventBuffer,
}

impl AggregateRoot for Product {
    fn aggregate_type() -> &'static str {
        "Product"
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

impl Product {
    /// Creates a product with zero stock and the given base stock policy.
    pub fn new(
        store_id: StoreId,
        name: impl Into<String>,
        unit_price: Money,
        stock_policy: StockLevel,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ProductId::new(),
            store_id,
            name: name.into(),
            unit_price,
            stock: StockLevel {
                quantity: 0,
                ..stock_policy
            },
            variants: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            version: Version::initial(),
            pending_movements: Vec::new(),
            events: EventBuffer::new(),
        }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    pub fn variant(&self, variant_id: VariantId) -> Option<&Variant> {
        self.variants.get(&variant_id)
    }

    /// Adds a variant and returns its id. The variant starts with zero stock.
    pub fn add_variant(&mut self, variant: Variant) -> VariantId {
        let id = variant.id;
        let variant = Variant {
            stock: StockLevel {
                quantity: 0,
                ..variant.stock
            },
            ..variant
        };
        self.variants.insert(id, variant);
        self.updated_at = Utc::now();
        id
    }

    /// Display name for an order line, including the variant name if any.
    pub fn line_name(&self, variant_id: Option<VariantId>) -> Result<String, InventoryError> {
        match variant_id {
            None => Ok(self.name.clone()),
            Some(id) => {
                let variant = self.variants.get(&id).ok_or(InventoryError::VariantNotFound {
                    product_id: self.id,
                    variant_id: id,
                })?;
                Ok(format!("{} ({})", self.name, variant.name))
            }
        }
    }

    /// Unit price for the base product or a variant.
    pub fn price_for(&self, variant_id: Option<VariantId>) -> Result<Money, InventoryError> {
        match variant_id {
            None => Ok(self.unit_price),
            Some(id) => {
                let variant = self.variants.get(&id).ok_or(InventoryError::VariantNotFound {
                    product_id: self.id,
                    variant_id: id,
                })?;
                Ok(variant.price_override.unwrap_or(self.unit_price))
            }
        }
    }

    /// Stock level for the base product or a variant.
    pub fn stock_level(&self, variant_id: Option<VariantId>) -> Result<&StockLevel, InventoryError> {
        match variant_id {
            None => Ok(&self.stock),
            Some(id) => self
                .variants
                .get(&id)
                .map(|variant| &variant.stock)
                .ok_or(InventoryError::VariantNotFound {
                    product_id: self.id,
                    variant_id: id,
                }),
        }
    }

    /// Changes stock by `delta` and appends the matching ledger movement.
    ///
    /// This is the only way quantity changes. The denormalized quantity and
    /// the new movement's `quantity_after` are written together, and a
    /// negative result is rejected unless backorder is allowed. Raises
    /// `StockChanged`, plus `VariantStockLow` when a decrement leaves the
    /// quantity below the low-stock threshold.
    pub fn adjust_inventory(
        &mut self,
        variant_id: Option<VariantId>,
        delta: i64,
        movement_type: MovementType,
        reason: impl Into<String>,
        order_id: Option<OrderId>,
    ) -> Result<InventoryMovement, InventoryError> {
        if delta == 0 {
            return Err(InventoryError::ZeroAdjustment);
        }

        let product_id = self.id;
        let level = match variant_id {
            None => &mut self.stock,
            Some(id) => {
                &mut self
                    .variants
                    .get_mut(&id)
                    .ok_or(InventoryError::VariantNotFound {
                        product_id,
                        variant_id: id,
                    })?
                    .stock
            }
        };

        let quantity_after = level
            .quantity
            .checked_add(delta)
            .ok_or(InventoryError::Overflow { product_id, variant_id })?;
        if quantity_after < 0 && !level.allow_backorder {
            return Err(InventoryError::InsufficientStock {
                product_id,
                variant_id,
                requested: -delta,
                available: level.quantity,
            });
        }
        level.quantity = quantity_after;
        let low_threshold = level
            .low_stock_threshold
            .filter(|threshold| delta < 0 && quantity_after < *threshold);

        let now = Utc::now();
        let movement = InventoryMovement {
            id: common::MovementId::new(),
            product_id,
            variant_id,
            quantity_change: delta,
            quantity_after,
            movement_type,
            reason: reason.into(),
            order_id,
            created_at: now,
        };
        self.pending_movements.push(movement.clone());
        self.updated_at = now;

        metrics::counter!("inventory_movements_total", "movement_type" => movement_type.as_str())
            .increment(1);

        self.record(ProductEvent::StockChanged(StockChangedData {
            product_id,
            store_id: self.store_id,
            variant_id,
            quantity_change: delta,
            quantity_after,
            movement_type,
            order_id,
        }));

        if let Some(threshold) = low_threshold {
            tracing::warn!(
                %product_id,
                ?variant_id,
                quantity = quantity_after,
                threshold,
                "stock below threshold"
            );
            self.record(ProductEvent::VariantStockLow(VariantStockLowData {
                product_id,
                store_id: self.store_id,
                variant_id,
                quantity: quantity_after,
                threshold,
            }));
        }

        Ok(movement)
    }

    /// Movements appended since load, in the order they were made.
    pub fn pending_movements(&self) -> &[InventoryMovement] {
        &self.pending_movements
    }

    /// Removes and returns the unpersisted movements.
    pub fn take_pending_movements(&mut self) -> Vec<InventoryMovement> {
        std::mem::take(&mut self.pending_movements)
    }

    fn record(&mut self, event: ProductEvent) {
        self.events
            .record(Self::aggregate_type(), self.id.as_uuid(), event);
    }
}

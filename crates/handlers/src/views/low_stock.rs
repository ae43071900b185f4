//! Low-stock read model: open alerts per product or variant.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ProductId, StoreId, VariantId};
use domain::{CommerceEvent, EventEnvelope, ProductEvent};
use tokio::sync::RwLock;

use crate::Result;
use crate::handler::EventHandler;
use crate::read_model::ReadModel;

/// An open low-stock alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub store_id: StoreId,
    pub quantity: i64,
    pub threshold: i64,
    pub raised_at: DateTime<Utc>,
}

type AlertKey = (ProductId, Option<VariantId>);

/// Tracks products and variants currently below their low-stock threshold.
///
/// An alert opens on `VariantStockLow`, follows later stock changes, and
/// closes once a `StockChanged` brings the quantity back to the threshold.
#[derive(Clone, Default)]
pub struct LowStockView {
    alerts: Arc<RwLock<HashMap<AlertKey, LowStockAlert>>>,
}

impl LowStockView {
    /// Creates a new empty view.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
    ) -> Option<LowStockAlert> {
        self.alerts
            .read()
            .await
            .get(&(product_id, variant_id))
            .cloned()
    }

    /// Open alerts for a store, lowest quantity first.
    pub async fn alerts_for_store(&self, store_id: StoreId) -> Vec<LowStockAlert> {
        let alerts = self.alerts.read().await;
        let mut open: Vec<_> = alerts
            .values()
            .filter(|a| a.store_id == store_id)
            .cloned()
            .collect();
        open.sort_by_key(|a| a.quantity);
        open
    }
}

#[async_trait]
impl EventHandler for LowStockView {
    fn name(&self) -> &'static str {
        "LowStockView"
    }

    fn handles(&self, event: &EventEnvelope) -> bool {
        matches!(event.event, CommerceEvent::Product(_))
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let CommerceEvent::Product(product_event) = &event.event else {
            return Ok(());
        };

        let mut alerts = self.alerts.write().await;
        match product_event {
            ProductEvent::VariantStockLow(data) => {
                alerts.insert(
                    (data.product_id, data.variant_id),
                    LowStockAlert {
                        product_id: data.product_id,
                        variant_id: data.variant_id,
                        store_id: data.store_id,
                        quantity: data.quantity,
                        threshold: data.threshold,
                        raised_at: event.occurred_at,
                    },
                );
            }
            ProductEvent::StockChanged(data) => {
                let key = (data.product_id, data.variant_id);
                if let Some(alert) = alerts.get_mut(&key) {
                    if data.quantity_after >= alert.threshold {
                        alerts.remove(&key);
                    } else {
                        alert.quantity = data.quantity_after;
                    }
                }
            }
        }
        Ok(())
    }
}

impl ReadModel for LowStockView {
    fn name(&self) -> &'static str {
        "LowStockView"
    }

    fn count(&self) -> usize {
        self.alerts.try_read().map(|a| a.len()).unwrap_or(0)
    }
}

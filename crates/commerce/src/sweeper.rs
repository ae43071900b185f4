//! Periodic removal of abandoned guest carts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use store::CommerceStore;

use crate::Result;
use crate::cancellation::CancellationToken;
use crate::config::CommerceConfig;

/// Deletes guest carts that have been inactive for longer than the TTL.
///
/// Customer carts are never swept.
pub struct CartExpirySweeper<S> {
    store: S,
    ttl: chrono::Duration,
    interval: Duration,
}

impl<S: CommerceStore> CartExpirySweeper<S> {
    pub fn new(store: S, ttl: chrono::Duration, interval: Duration) -> Self {
        Self {
            store,
            ttl,
            interval,
        }
    }

    pub fn from_config(store: S, config: &CommerceConfig) -> Self {
        Self::new(store, config.guest_cart_ttl(), config.cart_sweep_interval())
    }

    /// Runs one sweep as of `now` and returns how many carts were deleted.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self.store.delete_expired_guest_carts(now, self.ttl).await?;
        metrics::counter!("guest_carts_expired_total").increment(removed);
        if removed > 0 {
            tracing::info!(removed, ttl_days = self.ttl.num_days(), "expired guest carts deleted");
        }
        Ok(removed)
    }

    /// Sweeps immediately, then once per interval until cancelled.
    ///
    /// A failed sweep is logged and retried at the next tick.
    pub async fn run(&self, cancellation: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "cart expiry sweeper started");

        loop {
            tokio::select! {
                () = cancellation.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        tracing::error!(error = %e, "cart expiry sweep failed");
                    }
                }
            }
        }

        tracing::info!("cart expiry sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{CustomerId, GuestId, StoreId};
    use domain::{Cart, CartOwner};
    use store::{ChangeSet, InMemoryStore};

    async fn seeded() -> (InMemoryStore, StoreId) {
        let store = InMemoryStore::new();
        let store_id = StoreId::new();
        let guest = Cart::new(CartOwner::guest(store_id, GuestId::new("g-1").unwrap()));
        let customer = Cart::new(CartOwner::customer(store_id, CustomerId::new()));
        store
            .commit(ChangeSet::new().with_cart(guest).with_cart(customer))
            .await
            .unwrap();
        (store, store_id)
    }

    #[tokio::test]
    async fn test_sweep_respects_ttl() {
        let (store, _) = seeded().await;
        let sweeper = CartExpirySweeper::from_config(store.clone(), &CommerceConfig::default());

        assert_eq!(sweeper.sweep_once(Utc::now()).await.unwrap(), 0);
        let later = Utc::now() + chrono::Duration::days(31);
        assert_eq!(sweeper.sweep_once(later).await.unwrap(), 1);
        assert_eq!(store.cart_count().await, 1);
    }

    #[tokio::test]
    async fn test_run_sweeps_until_cancelled() {
        let (store, _) = seeded().await;
        let sweeper = CartExpirySweeper::new(
            store.clone(),
            chrono::Duration::zero(),
            Duration::from_millis(10),
        );
        let cancellation = CancellationToken::new();

        let handle = tokio::spawn({
            let cancellation = cancellation.clone();
            async move { sweeper.run(cancellation).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(store.cart_count().await, 1);
    }
}

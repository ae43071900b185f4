//! Order number allocation.
//!
//! Numbers look like `ORD-260117-7K2M9QXD`: a prefix, the UTC date and eight
//! random base-36 characters. A candidate is accepted once neither the store
//! nor another in-flight allocation holds it. After `max_attempts`
//! collisions the allocator falls back to `ORD-{unix millis}-{sequence}` so
//! checkout always makes progress; the store's uniqueness constraint remains
//! the final backstop.
//!
//! An allocated number is held as a [`Reservation`] and released when the
//! reservation is dropped, including when the placing future is abandoned.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::StoreId;
use domain::OrderNumber;
use store::{CommerceStore, StoreError};
use uuid::Uuid;

use crate::Result;

const ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SUFFIX_LEN: usize = 8;

static FALLBACK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Answers whether a store already holds an order number.
#[async_trait]
pub trait OrderNumberLookup: Send + Sync {
    async fn is_taken(&self, store_id: StoreId, order_number: &str)
    -> std::result::Result<bool, StoreError>;
}

#[async_trait]
impl<S: CommerceStore + ?Sized> OrderNumberLookup for S {
    async fn is_taken(
        &self,
        store_id: StoreId,
        order_number: &str,
    ) -> std::result::Result<bool, StoreError> {
        self.order_number_exists(store_id, order_number).await
    }
}

/// An order number held in flight for one store. Dropping it releases the
/// number.
#[derive(Debug)]
#[must_use = "dropping a reservation releases its order number"]
pub struct Reservation<'a> {
    allocator: &'a OrderNumberAllocator,
    store_id: StoreId,
    number: OrderNumber,
}

impl Reservation<'_> {
    pub fn number(&self) -> &OrderNumber {
        &self.number
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.allocator.release(self.store_id, &self.number);
    }
}

/// Hands out order numbers unique per store.
#[derive(Debug)]
pub struct OrderNumberAllocator {
    prefix: String,
    max_attempts: u32,
    /// Numbers handed out but not yet released, per store.
    in_flight: Mutex<HashMap<StoreId, HashSet<String>>>,
}

impl OrderNumberAllocator {
    pub fn new(prefix: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            prefix: prefix.into(),
            max_attempts,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates a number for `store_id`, held until the returned
    /// reservation is dropped.
    #[tracing::instrument(skip(self, lookup), fields(prefix = %self.prefix))]
    pub async fn allocate<L>(&self, lookup: &L, store_id: StoreId) -> Result<Reservation<'_>>
    where
        L: OrderNumberLookup + ?Sized,
    {
        for attempt in 1..=self.max_attempts {
            let candidate = self.candidate(Utc::now());
            if let Some(reservation) = self.try_reserve(lookup, store_id, &candidate).await? {
                tracing::debug!(attempt, order_number = %candidate, "order number allocated");
                return Ok(reservation);
            }
            metrics::counter!("order_number_collisions_total").increment(1);
            tracing::debug!(attempt, order_number = %candidate, "order number collision");
        }

        metrics::counter!("order_number_fallbacks_total").increment(1);
        loop {
            let fallback = OrderNumber::new(self.fallback(Utc::now()))?;
            if let Some(reservation) = self.hold(store_id, fallback) {
                tracing::warn!(
                    attempts = self.max_attempts,
                    order_number = %reservation.number(),
                    "order number attempts exhausted, using timestamp fallback"
                );
                return Ok(reservation);
            }
        }
    }

    /// Number of allocations not yet released for a store.
    pub fn in_flight(&self, store_id: StoreId) -> usize {
        self.lock_in_flight()
            .get(&store_id)
            .map_or(0, HashSet::len)
    }

    async fn try_reserve<L>(
        &self,
        lookup: &L,
        store_id: StoreId,
        candidate: &str,
    ) -> Result<Option<Reservation<'_>>>
    where
        L: OrderNumberLookup + ?Sized,
    {
        // Held before the lookup so concurrent allocations cannot pick it too.
        let Some(reservation) = self.hold(store_id, OrderNumber::new(candidate)?) else {
            return Ok(None);
        };
        if lookup.is_taken(store_id, candidate).await? {
            return Ok(None);
        }
        Ok(Some(reservation))
    }

    fn hold(&self, store_id: StoreId, number: OrderNumber) -> Option<Reservation<'_>> {
        let inserted = self
            .lock_in_flight()
            .entry(store_id)
            .or_default()
            .insert(number.as_str().to_string());
        inserted.then(|| Reservation {
            allocator: self,
            store_id,
            number,
        })
    }

    fn release(&self, store_id: StoreId, number: &OrderNumber) {
        let mut in_flight = self.lock_in_flight();
        if let Some(numbers) = in_flight.get_mut(&store_id) {
            numbers.remove(number.as_str());
            if numbers.is_empty() {
                in_flight.remove(&store_id);
            }
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<StoreId, HashSet<String>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn candidate(&self, now: DateTime<Utc>) -> String {
        let mut entropy = Uuid::new_v4().as_u128();
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        for _ in 0..SUFFIX_LEN {
            suffix.push(ALPHABET[(entropy % 36) as usize] as char);
            entropy /= 36;
        }
        format!("{}-{}-{}", self.prefix, now.format("%y%m%d"), suffix)
    }

    fn fallback(&self, now: DateTime<Utc>) -> String {
        let sequence = FALLBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}-{}", self.prefix, now.timestamp_millis(), sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures_util::future::join_all;

    /// Lookup that reports every number as taken.
    struct AlwaysTaken {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderNumberLookup for AlwaysTaken {
        async fn is_taken(
            &self,
            _store_id: StoreId,
            _order_number: &str,
        ) -> std::result::Result<bool, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    /// Lookup backed by a fixed set of taken numbers.
    struct Taken(HashSet<String>);

    #[async_trait]
    impl OrderNumberLookup for Taken {
        async fn is_taken(
            &self,
            _store_id: StoreId,
            order_number: &str,
        ) -> std::result::Result<bool, StoreError> {
            Ok(self.0.contains(order_number))
        }
    }

    /// Lookup that never answers.
    struct Stalled;

    #[async_trait]
    impl OrderNumberLookup for Stalled {
        async fn is_taken(
            &self,
            _store_id: StoreId,
            _order_number: &str,
        ) -> std::result::Result<bool, StoreError> {
            std::future::pending().await
        }
    }

    fn free() -> Taken {
        Taken(HashSet::new())
    }

    #[tokio::test]
    async fn test_candidate_format() {
        let allocator = OrderNumberAllocator::new("ORD", 10);
        let reservation = allocator.allocate(&free(), StoreId::new()).await.unwrap();

        let parts: Vec<&str> = reservation.number().as_str().split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], Utc::now().format("%y%m%d").to_string());
        assert_eq!(parts[2].len(), 8);
        assert!(
            parts[2]
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        );
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fall_back_to_timestamp() {
        let allocator = OrderNumberAllocator::new("SHOP", 4);
        let lookup = AlwaysTaken {
            calls: AtomicUsize::new(0),
        };

        let first = allocator.allocate(&lookup, StoreId::new()).await.unwrap();
        let second = allocator.allocate(&lookup, StoreId::new()).await.unwrap();

        assert_eq!(lookup.calls.load(Ordering::SeqCst), 8);
        for reservation in [&first, &second] {
            let parts: Vec<&str> = reservation.number().as_str().split('-').collect();
            assert_eq!(parts[0], "SHOP");
            assert!(parts[1].parse::<i64>().is_ok());
            assert!(parts[2].parse::<u64>().is_ok());
        }
        assert_ne!(first.number(), second.number());
    }

    #[tokio::test]
    async fn test_reservation_is_held_until_dropped() {
        let allocator = OrderNumberAllocator::new("ORD", 10);
        let store_id = StoreId::new();

        let reservation = allocator.allocate(&free(), store_id).await.unwrap();
        let number = reservation.number().clone();
        assert_eq!(allocator.in_flight(store_id), 1);
        assert!(
            allocator
                .try_reserve(&free(), store_id, number.as_str())
                .await
                .unwrap()
                .is_none()
        );

        drop(reservation);
        assert_eq!(allocator.in_flight(store_id), 0);
        assert!(
            allocator
                .try_reserve(&free(), store_id, number.as_str())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_taken_numbers_are_skipped() {
        let allocator = OrderNumberAllocator::new("ORD", 10);
        let store_id = StoreId::new();
        let taken = Taken(HashSet::from(["ORD-260101-AAAAAAAA".to_string()]));

        let rejected = allocator
            .try_reserve(&taken, store_id, "ORD-260101-AAAAAAAA")
            .await
            .unwrap();
        assert!(rejected.is_none());
        assert_eq!(allocator.in_flight(store_id), 0);

        let accepted = allocator
            .try_reserve(&taken, store_id, "ORD-260101-BBBBBBBB")
            .await
            .unwrap();
        assert!(accepted.is_some());
        assert_eq!(allocator.in_flight(store_id), 1);
    }

    #[tokio::test]
    async fn test_abandoned_allocation_releases_its_hold() {
        let allocator = OrderNumberAllocator::new("ORD", 10);
        let store_id = StoreId::new();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            allocator.allocate(&Stalled, store_id),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(allocator.in_flight(store_id), 0);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_unique() {
        let allocator = OrderNumberAllocator::new("ORD", 10);
        let lookup = free();
        let store_id = StoreId::new();

        let reservations = join_all((0..1_000).map(|_| allocator.allocate(&lookup, store_id))).await;
        let reservations: Vec<_> = reservations.into_iter().map(|r| r.unwrap()).collect();

        let numbers: HashSet<&str> = reservations.iter().map(|r| r.number().as_str()).collect();
        assert_eq!(numbers.len(), 1_000);
        assert_eq!(allocator.in_flight(store_id), 1_000);

        drop(numbers);
        drop(reservations);
        assert_eq!(allocator.in_flight(store_id), 0);
    }
}

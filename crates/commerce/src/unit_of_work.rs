//! Unit of work: persist every touched aggregate, then publish their events.

use std::future::Future;
use std::time::Instant;

use common::{CartId, Version};
use domain::{AggregateRoot, Cart, EventEnvelope, Order, Product};
use handlers::EventPublisher;
use store::{ChangeSet, CommerceStore, StoreError};

use crate::cancellation::CancellationToken;
use crate::{CommerceError, Result};

#[derive(Debug, Clone, Copy)]
enum Touched {
    Order(usize),
    Product(usize),
    Cart(usize),
}

/// Aggregates a use case changed, in the order it first touched them.
///
/// Committing is two-phase. The change set is persisted atomically first;
/// only when that succeeds are the buffered events handed to the publisher,
/// aggregate by aggregate and in the order each aggregate raised them. A
/// failed commit publishes nothing.
pub struct UnitOfWork<S> {
    store: S,
    cancellation: CancellationToken,
    orders: Vec<Order>,
    products: Vec<Product>,
    carts: Vec<Cart>,
    deleted_carts: Vec<(CartId, Version)>,
    touched: Vec<Touched>,
}

/// Aggregates as they were persisted, with their new versions.
#[derive(Debug, Default)]
pub struct Committed {
    pub orders: Vec<Order>,
    pub products: Vec<Product>,
    pub carts: Vec<Cart>,
    /// Events the publisher accepted.
    pub published: usize,
}

impl Committed {
    pub fn into_order(self) -> Option<Order> {
        self.orders.into_iter().next()
    }

    pub fn into_cart(self) -> Option<Cart> {
        self.carts.into_iter().next()
    }
}

impl<S> UnitOfWork<S>
where
    S: CommerceStore + Clone + 'static,
{
    pub fn begin(store: S, cancellation: CancellationToken) -> Self {
        Self {
            store,
            cancellation,
            orders: Vec::new(),
            products: Vec::new(),
            carts: Vec::new(),
            deleted_carts: Vec::new(),
            touched: Vec::new(),
        }
    }

    pub fn track_order(&mut self, order: Order) {
        self.touched.push(Touched::Order(self.orders.len()));
        self.orders.push(order);
    }

    pub fn track_product(&mut self, product: Product) {
        self.touched.push(Touched::Product(self.products.len()));
        self.products.push(product);
    }

    pub fn track_cart(&mut self, cart: Cart) {
        self.touched.push(Touched::Cart(self.carts.len()));
        self.carts.push(cart);
    }

    /// Deletes a cart as part of this unit of work. Its pending events are
    /// still published after commit.
    pub fn delete_cart(&mut self, cart: Cart) {
        self.deleted_carts.push((cart.id(), cart.version()));
        self.track_cart(cart);
    }

    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
    }

    /// Persists the tracked changes and publishes their events.
    ///
    /// Fails with [`CommerceError::Cancelled`] without writing anything if
    /// the cancellation token fired before the commit started. The write
    /// itself runs on its own task and always completes once started. Events
    /// a publisher rejects are logged; they never undo the commit.
    #[tracing::instrument(skip_all, fields(aggregates = self.touched.len()))]
    pub async fn commit(mut self, publisher: &dyn EventPublisher) -> Result<Committed> {
        if self.cancellation.is_cancelled() {
            tracing::info!("unit of work cancelled before commit");
            return Err(CommerceError::Cancelled);
        }
        if self.is_empty() {
            return Ok(Committed::default());
        }

        let events = self.drain_events();
        let changes = self.change_set();

        let start = Instant::now();
        let store = self.store.clone();
        let outcome = tokio::spawn(async move { store.commit(changes).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("commit task failed: {e}")))
            .and_then(|result| result);
        metrics::histogram!("unit_of_work_commit_seconds").record(start.elapsed().as_secs_f64());

        if let Err(e) = outcome {
            metrics::counter!("unit_of_work_commits_total", "outcome" => "failed").increment(1);
            tracing::warn!(error = %e, discarded_events = events.len(), "unit of work commit failed");
            return Err(e.into());
        }
        metrics::counter!("unit_of_work_commits_total", "outcome" => "committed").increment(1);

        for order in &mut self.orders {
            order.set_version(order.version().next());
        }
        for product in &mut self.products {
            product.set_version(product.version().next());
            product.take_pending_movements();
        }
        for cart in &mut self.carts {
            cart.set_version(cart.version().next());
        }

        let published = publish_all(publisher, &events).await;
        Ok(Committed {
            orders: self.orders,
            products: self.products,
            carts: self
                .carts
                .into_iter()
                .filter(|cart| !self.deleted_carts.iter().any(|(id, _)| *id == cart.id()))
                .collect(),
            published,
        })
    }

    fn drain_events(&mut self) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        for touched in &self.touched {
            match *touched {
                Touched::Order(i) => events.extend(self.orders[i].drain_events()),
                Touched::Product(i) => events.extend(self.products[i].drain_events()),
                Touched::Cart(i) => events.extend(self.carts[i].drain_events()),
            }
        }
        events
    }

    fn change_set(&self) -> ChangeSet {
        let deleted = |cart: &&Cart| self.deleted_carts.iter().any(|(id, _)| *id == cart.id());
        ChangeSet {
            orders: self.orders.clone(),
            products: self.products.clone(),
            carts: self
                .carts
                .iter()
                .filter(|cart| !deleted(cart))
                .cloned()
                .collect(),
            deleted_carts: self.deleted_carts.clone(),
        }
    }
}

async fn publish_all(publisher: &dyn EventPublisher, events: &[EventEnvelope]) -> usize {
    let mut published = 0;
    for event in events {
        match publisher.publish(event).await {
            Ok(()) => {
                published += 1;
                metrics::counter!("events_dispatched_total", "event_type" => event.event_type())
                    .increment(1);
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event.event_id,
                    event_type = event.event_type(),
                    error = %e,
                    "event publish failed after commit"
                );
            }
        }
    }
    published
}

/// Re-runs a whole unit of work after a retryable concurrency conflict, at
/// most `retries` times.
pub(crate) async fn with_conflict_retries<T, F, Fut>(
    operation: &'static str,
    retries: u32,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retried = 0;
    loop {
        match attempt().await {
            Err(e) if e.is_retryable() && retried < retries => {
                retried += 1;
                metrics::counter!("unit_of_work_retries_total", "operation" => operation)
                    .increment(1);
                tracing::warn!(operation, retry = retried, error = %e, "conflict, re-running unit of work");
            }
            outcome => return outcome,
        }
    }
}

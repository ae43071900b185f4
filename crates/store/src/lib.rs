//! Persistence for the commerce aggregates.
//!
//! [`CommerceStore`] loads aggregates and commits a [`ChangeSet`] atomically
//! with per-row optimistic concurrency. Two implementations are provided:
//! [`InMemoryStore`] for tests and local runs, and [`PostgresStore`].

pub mod changeset;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use changeset::ChangeSet;
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CommerceStore, CommerceStoreExt};

//! Background worker for the commerce core.
//!
//! Hosts the periodic guest cart expiry sweep against Postgres or, when no
//! database is configured, an in-memory store.

pub mod config;

pub use config::{Config, LogFormat};

use commerce::{CancellationToken, CartExpirySweeper, CommerceConfig};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, StoreError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// The store the worker runs against.
pub enum Backend {
    Postgres(PostgresStore),
    Memory(InMemoryStore),
}

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Connects to Postgres and applies migrations, or falls back to memory.
pub async fn connect(config: &Config) -> Result<Backend, StoreError> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, using in-memory store");
        return Ok(Backend::Memory(InMemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(url)
        .await?;
    let store = PostgresStore::new(pool);
    store.run_migrations().await?;
    tracing::info!("connected to postgres, migrations applied");
    Ok(Backend::Postgres(store))
}

/// Runs the cart expiry sweep until `shutdown` is cancelled.
pub async fn run_sweeper(backend: Backend, config: &CommerceConfig, shutdown: CancellationToken) {
    match backend {
        Backend::Postgres(store) => {
            CartExpirySweeper::from_config(store, config)
                .run(shutdown)
                .await
        }
        Backend::Memory(store) => {
            CartExpirySweeper::from_config(store, config)
                .run(shutdown)
                .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_backend_without_database_url() {
        let backend = connect(&Config::default()).await.unwrap();
        assert!(matches!(backend, Backend::Memory(_)));
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                run_sweeper(
                    Backend::Memory(InMemoryStore::new()),
                    &CommerceConfig::default(),
                    shutdown,
                )
                .await
            }
        });

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}

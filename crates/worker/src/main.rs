//! Worker entry point.

use commerce::CancellationToken;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use worker::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Configuration and tracing
    let config = Config::from_env();
    worker::init_tracing(&config);

    // 2. Prometheus exporter with its own HTTP listener
    PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()
        .expect("failed to install Prometheus exporter");
    tracing::info!(addr = %config.metrics_addr, "metrics listener started");

    // 3. Store
    let backend = match worker::connect(&config).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise store");
            std::process::exit(1);
        }
    };

    // 4. Sweep until shutdown
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });
    worker::run_sweeper(backend, &config.commerce, shutdown).await;

    tracing::info!("worker shut down gracefully");
}

//! Siphon Server - Main entry point

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::info;

use siphon_common::logging::{init_logging, LogConfig};
use siphon_server::{
    api::{self, AppState},
    config::Config,
    queue::PgQueue,
    warehouse::PgWarehouse,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("siphon-server".to_string())
        .filter_directives("siphon_server=debug,tower_http=debug,axum=trace,sqlx=info".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting Siphon Server");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    // Bootstrap both collaborators against the pool
    let queue = PgQueue::new(
        db_pool.clone(),
        config.queue.name.clone(),
        config.queue.lease_secs,
    );
    queue.ensure_table().await?;
    info!(queue = %config.queue.name, "Relay queue table ready");

    let warehouse = PgWarehouse::new(db_pool.clone(), config.warehouse.schema.clone());
    warehouse.ensure_dataset().await?;
    info!(schema = %config.warehouse.schema, "Warehouse schema ready");

    // Create application state
    let state = AppState {
        db: db_pool,
        queue: Arc::new(queue),
        warehouse: Arc::new(warehouse),
        pipeline: config.pipeline.clone(),
    };

    // Build the application router
    let app = api::router(state);

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

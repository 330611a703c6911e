//! schemaplan - declarative Postgres schema management
//!
//! Operators submit the desired shape of a table or extension; the service
//! plans the DDL as a migration, waits for approval, then executes it
//! against the target database and records the outcome.

mod config;
mod connection;
mod database;
mod diff;
mod error;
mod execution;
mod migration;
mod models;
mod reconciler;
mod routes;
mod schema;
mod state;

use crate::config::Settings;
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting schemaplan...");

    let settings = Settings::load()?;
    info!(
        databases = settings.databases.len(),
        reconcile_interval_secs = settings.reconciler.interval.as_secs(),
        execution_timeout_secs = settings.reconciler.execution_timeout.as_secs(),
        "Configuration loaded"
    );

    let mut databases: Vec<&str> = settings.databases.keys().map(String::as_str).collect();
    databases.sort_unstable();
    info!("Database registry: {:?}", databases);

    let state = Arc::new(AppState::new(&settings)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconcile_loop = tokio::spawn(
        state
            .reconciler
            .clone()
            .run(settings.reconciler.interval, shutdown_rx),
    );

    let app = create_router(state, &settings);
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("Server listening on http://{}", addr);
    info!("   POST /api/tables/plan              - Plan a table migration");
    info!("   POST /api/extensions/plan          - Plan an extension migration");
    info!("   GET  /api/migrations               - List migrations (?phase=)");
    info!("   GET  /api/migrations/:id           - Get a migration");
    info!("   POST /api/migrations/:id/approve   - Approve a migration");
    info!("   POST /api/migrations/:id/reconcile - Reconcile a migration now");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    reconcile_loop.await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,schemaplan=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}

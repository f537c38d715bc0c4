//! Loyalty Service - points accrual and withdrawal API
//!
//! This is the main entry point for the loyalty service.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loyalty_accrual::AccrualClient;
use loyalty_service::{
    create_router, AppState, CliArgs, Reconciler, ReconcilerConfig, ServiceConfig,
};
use loyalty_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,loyalty=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Loyalty Service");

    // Flags first, environment wins
    let config = ServiceConfig::from_args(args);

    tracing::info!(
        listen_addr = %config.listen_addr,
        database_configured = %config.database_uri.is_some(),
        accrual_address = ?config.accrual_address,
        "Service configuration loaded"
    );

    let store: Arc<dyn Store> = match &config.database_uri {
        Some(uri) => {
            let store = PgStore::connect(uri).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("No database configured - using in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let shutdown = CancellationToken::new();

    // Start the reconciler
    let reconciler_task = match &config.accrual_address {
        Some(address) => {
            let client = AccrualClient::new(
                address.as_str(),
                Duration::from_secs(config.accrual_timeout_seconds),
            )?;
            let reconciler =
                Reconciler::new(Arc::clone(&store), client, ReconcilerConfig::default());
            let token = shutdown.clone();
            Some(tokio::spawn(async move { reconciler.run(token).await }))
        }
        None => {
            tracing::warn!(
                "No accrual address configured - orders will not be reconciled"
            );
            None
        }
    };

    let app = create_router(AppState::new(store, config.clone()));

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    let server_token = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await?;

    // The server may also stop on its own; make sure the reconciler follows.
    shutdown.cancel();
    if let Some(task) = reconciler_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }
    }

    tracing::info!("Loyalty Service stopped");
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    shutdown.cancel();
}

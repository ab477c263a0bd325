//! services/api/src/bin/gophermart.rs

use gophermart_core::token_cache::TokenCache;
use gophermart_lib::{
    adapters::{DbAdapter, HttpAccrualAdapter},
    config::Config,
    error::ApiError,
    tasks::{housekeeper_process, reconciliation_process},
    web::{self, rest::ApiDoc, state::AppState},
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(bind_address = %config.bind_address, accrual = %config.accrual_address, "Configuration loaded. Starting GopherMart...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let accrual_adapter = Arc::new(HttpAccrualAdapter::new(
        config.accrual_address.clone(),
        config.accrual_request_timeout,
    )?);
    let tokens = Arc::new(TokenCache::new(config.auth_cache_timeout));

    // --- 4. Start Background Tasks ---
    let shutdown = CancellationToken::new();
    let housekeeper = tokio::spawn(housekeeper_process(
        tokens.clone(),
        config.auth_cache_housekeeper_time,
        shutdown.child_token(),
    ));
    let reconciliation = tokio::spawn(reconciliation_process(
        db_adapter.clone(),
        accrual_adapter,
        config.accrual_frequency,
        shutdown.child_token(),
    ));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        tokens,
    });

    // --- 6. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    tokio::spawn(shutdown_signal(shutdown.clone()));

    info!("Starting server on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await?;

    // --- 8. Drain Background Tasks ---
    shutdown.cancel();
    for (name, handle) in [("housekeeper", housekeeper), ("reconciliation", reconciliation)] {
        if let Err(e) = handle.await {
            error!("{} task ended abnormally: {}", name, e);
        }
    }
    db_pool.close().await;
    info!("Shutdown complete.");

    Ok(())
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received.");
    shutdown.cancel();
}

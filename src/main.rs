use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{net::TcpListener, signal};

use marker_api::{
    app,
    auth::TokenAuthenticator,
    config::AppConfig,
    database::{DatabaseManager, PgStore},
    logging,
    storage::HttpBlobStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = AppConfig::from_env().context("invalid configuration")?;
    logging::init(&config.log_level);
    tracing::info!("Starting marker API in {:?} mode", config.environment);
    if config.is_production() && config.security.cors_origins.is_empty() {
        tracing::warn!("SECURITY_CORS_ORIGINS is empty; CORS is permissive");
    }

    // Lazy pool: /ping answers even while the database is down
    let pool = DatabaseManager::connect_lazy(&config.database)?;
    let store = PgStore::new(pool, Duration::from_millis(config.database.statement_timeout_ms));
    let blobs = HttpBlobStore::new(&config.storage)?;
    let tokens = TokenAuthenticator::new(config.require_jwt_secret()?, config.security.jwt_expiry_hours)?;

    let state = AppState::new(Arc::new(store), Arc::new(blobs), tokens);
    let app = app(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.api.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Marker API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

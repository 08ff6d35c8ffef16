//! Standalone media proxy.
//!
//! Resolves the adapter configuration from the environment, mounts the
//! serve router under `/content/images` and streams objects straight
//! from the bucket. Meant for hosts that keep the rest of the provider
//! contract in-process and only need the public byte endpoint.

mod telemetry;

use axum::Router;
use stowage_storage::create_storage;
use stowage_storage::Storage as _;
use stowage_storage::StorageConfig;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load .env first so configuration resolution sees it.
    dotenvy::dotenv().ok();
    telemetry::init();

    let config = StorageConfig::from_env()?;
    let storage = create_storage(&config)?;
    let app = Router::new().nest("/content/images", storage.serve());

    start_server(app).await
}

async fn start_server(app: Router) -> Result<(), anyhow::Error> {
    let port: u16 = std::env::var("STOWAGE_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let addr = format!("0.0.0.0:{}", port);
    tracing::info!(addr = %addr, "starting server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Listen for Ctrl+C (SIGINT) and SIGTERM to initiate graceful shutdown.
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

use anyhow::Context;
use secret_server::config::Config;
use secret_server::router;
use secret_server::state::AppState;
use secret_server::storage::SecretStorage;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env().context("Failed to parse configuration")?;

    secret_server::metrics::register_metrics();

    let state = AppState::new(config.clone())
        .await
        .context("Failed to initialise storage")?;

    spawn_purge_task(
        state.storage.clone(),
        config.storage.cleanup_interval_seconds,
    );

    let metrics_listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.metrics_port))
            .await
            .context("Failed to bind metrics address")?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, router::create_metrics_router()).await {
            tracing::error!(error = %e, "metrics server stopped");
        }
    });

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .context("Failed to bind API address")?;

    tracing::info!(
        "Server running on http://{}:{} (metrics on port {})",
        config.server.host,
        config.server.port,
        config.server.metrics_port
    );

    axum::serve(listener, router::create_router(state))
        .await
        .context("Server error")?;

    Ok(())
}

/// Periodically removes secrets nobody will be able to read again.
fn spawn_purge_task(storage: Arc<dyn SecretStorage>, interval_seconds: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds.max(1)));
        loop {
            interval.tick().await;
            match storage.purge_unavailable().await {
                Ok(purged) => {
                    if !purged.is_empty() {
                        tracing::info!("Purged {} unavailable secrets", purged.len());
                    }
                }
                Err(e) => {
                    tracing::error!("Purge error: {:?}", e);
                }
            }
        }
    });
}

//! storeflow-server: provisioning functions over HTTP

use storeflow_server::utils::logger;
use storeflow_server::{AppState, Config, api};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    let _log_guard = logger::init_logger_with_file(&config.log_level, config.log_dir.as_deref());

    tracing::info!("Starting storeflow-server (env: {})", config.environment);

    if let Some(dir) = config.log_dir.clone() {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
            loop {
                interval.tick().await;
                if let Err(e) = logger::cleanup_old_logs(std::path::Path::new(&dir), logger::LOG_RETENTION_DAYS) {
                    tracing::warn!("Log cleanup failed: {e:#}");
                }
            }
        });
    }

    let state = AppState::new(&config).await?;
    let app = api::build_app(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("storeflow-server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("storeflow-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutdown signal received");
}

use std::sync::Arc;

use server::analysis::worker::{self, AnalysisJobs};
use server::db::AppState;
use server::reasoning::{AnthropicClient, ReasoningConfig};
use server::storage::S3ObjectStore;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    let config = server::config::load_config();

    server::telemetry::init_logging();
    if config.features.telemetry {
        server::telemetry::init_telemetry();
    }
    server::health::record_start_time();

    let pool = server::db::create_pool()?;
    server::db::run_migrations(&pool).await?;
    tracing::info!("migrations applied");

    let store = S3ObjectStore::from_env(config.uploads.presign_expiry_secs)?;
    store.ensure_bucket().await;

    let reasoner = AnthropicClient::new(ReasoningConfig::from_env(
        config.analysis.request_timeout_secs,
    ))?;

    let state = AppState {
        pool,
        store: Arc::new(store),
        reasoner: Arc::new(reasoner),
        jobs: AnalysisJobs::new(),
        config: Arc::new(config),
    };

    if state.config.features.analysis_worker {
        worker::spawn(state.clone());
    } else {
        tracing::info!("analysis worker disabled on this instance");
    }

    let router = server::openapi::build_router(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, version = env!("CARGO_PKG_VERSION"), "advocase listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

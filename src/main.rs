//! Chat gateway relaying a local Ollama daemon to the browser over SSE

use anyhow::anyhow;
use di::Ref;
use log::{debug, info};
use ollama_chat_gateway::core::traits::ModelCatalog;
use ollama_chat_gateway::infrastructure::config::GatewayConfig;
use ollama_chat_gateway::{build_app, services};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(GatewayConfig::from_env().debug);

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(web_server_task())?;

    info!("Shutting down...");
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_filter = if debug {
        "ollama_chat_gateway=debug,tower_http=debug"
    } else {
        "ollama_chat_gateway=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();
}

async fn web_server_task() -> anyhow::Result<()> {
    let provider = services()
        .build_provider()
        .map_err(|e| anyhow!("invalid service registrations: {e:?}"))?;

    let config = provider.get_required::<GatewayConfig>();
    info!("Using Ollama host: {}", config.ollama_host);

    let refresh_handle = spawn_model_refresh(
        provider.get_required::<dyn ModelCatalog>(),
        config.model_refresh_interval,
    );

    let app = build_app(provider, &config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Starting server on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_handle.abort();
    Ok(())
}

/// Keeps the model allow-list current. The first tick fires immediately, so the list is
/// populated at startup.
fn spawn_model_refresh(catalog: Ref<dyn ModelCatalog>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(MIN_REFRESH_INTERVAL));
        loop {
            ticker.tick().await;
            let models = catalog.refresh().await;
            debug!("Model catalog refreshed, {} models installed", models.len());
        }
    })
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

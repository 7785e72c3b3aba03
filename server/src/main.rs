use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use cloner_core::{CloningEngine, F5Engine};
use server::config::ServerConfig;
use server::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    info!("Starting alphabet voice-cloning server...");
    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, vocoder={}, scratch_dir={}",
        config.port,
        config.vocoder,
        config.scratch_dir.display()
    );

    // Model weights load once here and are shared for the process lifetime.
    let engine: Arc<dyn CloningEngine> = Arc::new(F5Engine::load(&config.engine_config())?);

    let state = AppState {
        engine,
        request_count: Arc::new(AtomicU64::new(0)),
        config: config.clone(),
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT."))?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

mod config;
mod driver;
mod handlers;
mod registry;
mod rpc;
mod scheduler;
mod state;

use anyhow::{Context, Result};
use std::{fs, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::MasterConfig;
use crate::registry::WorkerRegistry;
use crate::rpc::HttpRemoteCall;
use crate::scheduler::Scheduler;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("master=debug,tower_http=info")),
        )
        .init();

    let config = MasterConfig::from_env();
    fs::create_dir_all(&config.work_dir)
        .with_context(|| format!("creando {}", config.work_dir.display()))?;

    let registry = WorkerRegistry::new(config.worker_failure_limit);
    let rpc = Arc::new(HttpRemoteCall::new(config.rpc_timeout)?);
    let scheduler = Scheduler::new(registry.clone(), rpc, config.retry.clone());

    info!(
        "work_dir={} max_attempts={:?} rpc_timeout={:?}",
        config.work_dir.display(),
        config.retry.max_attempts,
        config.rpc_timeout
    );

    let listen_addr = config.listen_addr.clone();
    let state = AppState::new(config, registry, scheduler);

    // router HTTP
    let app = handlers::build_router(state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("no se pudo escuchar en {}", listen_addr))?;
    info!("master escuchando en {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

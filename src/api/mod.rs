pub mod routes;

use crate::attendance::Reconciler;
use crate::config::Config;
use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::info;

pub async fn run_server(config: Arc<Config>) -> Result<()> {
    let addr = SocketAddr::new(config.api_bind, config.api_port);
    let state = routes::ApiState {
        reconciler: Reconciler::from_config(&config),
        config,
        write_lock: Arc::new(Mutex::new(())),
    };
    let app: Router = routes::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server: {addr}"))?;

    info!(address = %addr, "attendance ingest server started");

    axum::serve(listener, app)
        .await
        .context("API server failed")?;

    Ok(())
}

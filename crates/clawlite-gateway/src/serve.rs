//! Binds and runs the gateway's HTTP + WebSocket listener.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Serve the gateway on `host:port` until `shutdown` is cancelled.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16, shutdown: CancellationToken) -> Result<()> {
    let router = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind gateway listener on {addr}"))?;

    info!(addr = %addr, "gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("gateway server error")?;

    info!("gateway stopped");
    Ok(())
}

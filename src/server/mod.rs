//! HTTP API server for the classification engine.

pub mod routes;

use crate::engine::ClassificationEngine;
use std::sync::Arc;

/// Shared application state for the HTTP server.
#[derive(Debug)]
pub struct AppState {
    pub engine: ClassificationEngine,
}

impl AppState {
    pub fn new(engine: ClassificationEngine) -> Arc<Self> {
        Arc::new(Self { engine })
    }
}

/// Serve `engine` on `addr` until the process is stopped.
pub async fn start(addr: &str, engine: ClassificationEngine) -> anyhow::Result<()> {
    let app = routes::create_router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

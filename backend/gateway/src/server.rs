//! HTTP server: REST queries and the live-update WebSocket.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use voxledger_core::Clock;
use voxledger_ledger::LedgerHandle;

use crate::api;
use crate::ws_server;

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub ledger: LedgerHandle,
    pub clock: Arc<dyn Clock>,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(ledger: LedgerHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger,
            clock,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/voice-time", get(api::voice_time))
        .route("/api/voice-data", get(api::voice_data))
        .route("/api/ws", get(ws_server::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
#[instrument(skip(state, shutdown))]
pub async fn start_server<F>(addr: SocketAddr, state: GatewayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("Gateway HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Gateway HTTP server stopped");
    Ok(())
}

//! HTTP surface
//!
//! `POST /tts` is the stateless synthesis gateway. Everything under
//! `/sessions` drives the page-synchronized reader.

mod sessions;
mod tts;

use crate::config::{Config, ServerConfig};
use crate::error::{Error, Result};
use crate::pdf::{FrameCache, PdfBackend};
use crate::session::SessionManager;
use crate::speech::{voices, SpeechGateway, SpeechProvider};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: Arc<SessionManager>,
    pub gateway: SpeechGateway,
    pub backend: Arc<dyn PdfBackend>,
    pub frames: Arc<FrameCache>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        backend: Arc<dyn PdfBackend>,
        provider: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::from_config(&config)),
            frames: Arc::new(FrameCache::new(
                config.frame_cache_entries,
                config.frame_cache_bytes,
            )),
            gateway: SpeechGateway::new(provider),
            backend,
            config: Arc::new(config),
        }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/voices", get(list_voices))
        .route("/tts", post(tts::synthesize_speech))
        .nest("/sessions", sessions::router())
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    sessions: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.count(),
    })
}

async fn list_voices() -> Json<&'static [voices::Voice]> {
    Json(voices::all())
}

/// Decode a JSON request body, reporting malformed input as a 400
fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| Error::InvalidRequest {
        reason: format!("Invalid JSON body: {}", e),
    })
}

/// Serve until Ctrl+C / SIGTERM
pub async fn run_server(
    config: Config,
    backend: Arc<dyn PdfBackend>,
    provider: Arc<dyn SpeechProvider>,
) -> Result<()> {
    let addr = config.server.socket_addr()?;
    let state = AppState::new(config.server, backend, provider);
    let cleanup = state.sessions.start_cleanup_task();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "PDF speech server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = cleanup.send(true);
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

//! HTTP surface for the memory engine.
//!
//! A thin axum layer over the pipelines: handlers validate and translate
//! between wire DTOs and engine calls, nothing more. Engine errors map
//! onto `{"error": {"status", "message"}}` bodies.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::signal;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::extractor::{CompletionProvider, FactExtractor};
use crate::memory::{IngestionPipeline, RetrievalPipeline, SignalService};
use crate::storage::MemoryStore;
use crate::temporal::TemporalService;

/// Shared application state for all handlers.
pub struct AppState {
    pub store: Arc<dyn MemoryStore>,
    pub embedder: Arc<dyn Embedder>,
    pub ingestion: IngestionPipeline,
    pub retrieval: RetrievalPipeline,
    pub temporal: TemporalService,
    pub signal: SignalService,
}

impl AppState {
    /// Wire the pipelines up from the injected store and providers.
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        completion: Arc<dyn CompletionProvider>,
        config: &Config,
    ) -> Self {
        let extractor = Arc::new(FactExtractor::new(completion));
        Self {
            ingestion: IngestionPipeline::new(store.clone(), embedder.clone(), extractor),
            retrieval: RetrievalPipeline::new(
                store.clone(),
                embedder.clone(),
                config.retrieval.to_pipeline_config(),
            ),
            temporal: TemporalService::new(store.clone()),
            signal: SignalService::new(store.clone(), config.decay.to_schedule()),
            store,
            embedder,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Provider(_) => StatusCode::BAD_GATEWAY,
            EngineError::Store(_)
            | EngineError::Config(_)
            | EngineError::Io(_)
            | EngineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": {
                "status": status.as_u16(),
                "message": self.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Create the router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route(
            "/engrams",
            post(handlers::ingest).get(handlers::list_engrams),
        )
        .route("/engrams/search", post(handlers::search))
        .route(
            "/engrams/{id}",
            get(handlers::get_engram)
                .patch(handlers::update_engram)
                .delete(handlers::delete_engram),
        )
        .route("/engrams/{id}/reinforce", post(handlers::reinforce_engram))
        .route(
            "/chronicles",
            post(handlers::record_chronicle).get(handlers::query_chronicles),
        )
        .route("/chronicles/current", get(handlers::current_chronicles))
        .route("/chronicles/timeline", get(handlers::chronicle_timeline))
        .route(
            "/chronicles/{id}",
            axum::routing::patch(handlers::update_chronicle).delete(handlers::expire_chronicle),
        )
        .route("/chronicles/{id}/related", get(handlers::related_chronicles))
        .route("/nexuses", post(handlers::create_nexus))
        .route("/decay/run", post(handlers::run_decay))
        .with_state(state)
}

/// Serve the API until Ctrl+C or SIGTERM.
pub async fn serve(state: Arc<AppState>, config: &Config) -> Result<()> {
    let app = create_router(state.clone());

    let addr: SocketAddr = config
        .server
        .listen_addr
        .parse()
        .map_err(|e| EngineError::Config(format!("invalid listen address: {e}")))?;

    tracing::info!("starting engramd on {addr}");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| EngineError::Config(format!("failed to bind to {addr}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| EngineError::Io(std::io::Error::other(format!("server error: {e}"))))?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        },
    }
}

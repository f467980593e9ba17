//! Application startup and lifecycle management.

use crate::config::FortuneConfig;
use crate::handlers;
use crate::services::providers::ollama::OllamaProvider;
use crate::services::providers::ChatProvider;
use crate::services::{ChatProxy, LotStore};
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::tracing::{request_id_from, request_id_middleware};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: FortuneConfig,
    pub lots: LotStore,
    pub chat: ChatProxy,
}

impl AppState {
    pub fn new(config: FortuneConfig, provider: Arc<dyn ChatProvider>) -> Self {
        Self {
            lots: LotStore::new(config.lots.path.clone()),
            chat: ChatProxy::new(provider, config.ollama.clone()),
            config,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let static_dir = state.config.static_files.dir.clone();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/draw", get(handlers::draw_lot))
        .route("/api/lot/:lot_id", get(handlers::get_lot))
        .route("/api/ollama/status", get(handlers::ollama_status))
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id =
                    request_id_from(request.headers()).unwrap_or_else(|| "-".to_string());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: FortuneConfig) -> Result<Self, AppError> {
        let provider: Arc<dyn ChatProvider> =
            Arc::new(OllamaProvider::new(config.ollama.clone()));

        tracing::info!(
            base_url = %config.ollama.base_url,
            model = %config.ollama.model,
            timeout_secs = config.ollama.timeout_secs,
            "Initialized Ollama provider"
        );

        if !config.lots.path.exists() {
            tracing::warn!(path = %config.lots.path.display(), "Lots file does not exist yet");
        }

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let router = build_router(AppState::new(config, provider));

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }
}

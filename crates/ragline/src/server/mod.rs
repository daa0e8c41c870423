//! HTTP server exposing ingestion, retrieval and generation

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::RagConfig;
use crate::error::{Error, Result};
use state::AppState;

/// RAG HTTP server
pub struct RagServer {
    config: RagConfig,
    state: AppState,
}

impl RagServer {
    /// Create a server, connecting to every configured provider
    pub async fn new(config: RagConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Start the server and run until Ctrl+C
    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = build_router(self.state.clone(), &self.config);

        tracing::info!("Starting RAG server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        let state = self.state.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for shutdown signal: {}", e);
                }
                tracing::info!("Shutting down");
                state.set_ready(false);
            })
            .await
            .map_err(|e| Error::internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.server.host, self.config.server.port)
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState, config: &RagConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness))
        .nest("/api", routes::api_routes(config.server.max_upload_size))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.server.enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Readiness: server accepting work and every provider reachable
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if !state.is_ready() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "ready": false })),
        );
    }

    let health = state.pipeline().health().await;
    let status = if health.all_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({ "ready": health.all_healthy(), "providers": health })),
    )
}

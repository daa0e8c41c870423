//! API routes

pub mod documents;
pub mod jobs;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Ingestion
        .route(
            "/upload",
            post(documents::upload_files).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents", post(documents::add_documents))
        // Retrieval and generation
        .route("/query", get(query::query_documents))
        .route("/generate_response", get(query::generate_response))
        // Background jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job_progress))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "ragline",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /api/upload": "Upload .txt or .pdf files for background ingestion",
            "POST /api/documents": "Ingest raw documents ({id, text, metadata})",
            "GET /api/query": "Retrieve the top_k most relevant chunks",
            "GET /api/generate_response": "Answer a query from retrieved context",
            "GET /api/jobs": "List upload jobs and queue stats",
            "GET /api/jobs/:id": "Get upload job progress"
        }
    }))
}

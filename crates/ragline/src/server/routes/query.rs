//! Retrieval and generation endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, RetrievedMatch};

/// Response for GET /api/query
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    /// Chunk texts in ranked order
    pub retrieved_docs: Vec<String>,
    /// Full matches with scores and metadata
    pub matches: Vec<RetrievedMatch>,
}

/// Response for GET /api/generate_response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub query: String,
    pub response: String,
    pub context: Vec<String>,
}

/// GET /api/query - Retrieve relevant chunks
pub async fn query_documents(
    State(state): State<AppState>,
    Query(request): Query<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    request.validate()?;
    let top_k = request
        .top_k
        .unwrap_or(state.config().retrieval.default_top_k);

    let matches = state.pipeline().retrieve(&request.query, top_k).await?;
    Ok(Json(QueryResponse {
        retrieved_docs: matches.iter().map(|m| m.text.clone()).collect(),
        query: request.query,
        matches,
    }))
}

/// GET /api/generate_response - Answer from retrieved context
pub async fn generate_response(
    State(state): State<AppState>,
    Query(request): Query<QueryRequest>,
) -> Result<Json<GenerateResponse>> {
    request.validate()?;
    let answer = state
        .pipeline()
        .generate(&request.query, request.top_k)
        .await?;

    Ok(Json(GenerateResponse {
        query: answer.query,
        response: answer.answer,
        context: answer.context,
    }))
}

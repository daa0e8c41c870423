//! Error types for the ingestion and retrieval pipeline

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// No extractor is registered for the requested content type
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// File content could not be turned into text
    #[error("Failed to extract text from '{source_name}': {message}")]
    Extraction { source_name: String, message: String },

    /// Embedding capability returned an error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector index capability returned an error
    #[error("Vector index error: {0}")]
    VectorDb(String),

    /// Completion capability returned an error
    #[error("LLM error: {0}")]
    Llm(String),

    /// A bounded external call exceeded its deadline
    #[error("{service} call timed out after {after:?}")]
    Timeout { service: &'static str, after: Duration },

    /// Target index does not exist
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Vector length does not match the index dimensionality
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller-supplied input failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Background job id is unknown
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification reported to callers alongside the human-readable message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConfigurationError,
    UnsupportedFormat,
    ExtractionFailure,
    DependencyFailure,
    DependencyTimeout,
    IndexNotFound,
    DimensionMismatch,
    InvalidInput,
    NotFound,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::ConfigurationError => "ConfigurationError",
            ErrorKind::UnsupportedFormat => "UnsupportedFormat",
            ErrorKind::ExtractionFailure => "ExtractionFailure",
            ErrorKind::DependencyFailure => "DependencyFailure",
            ErrorKind::DependencyTimeout => "DependencyTimeout",
            ErrorKind::IndexNotFound => "IndexNotFound",
            ErrorKind::DimensionMismatch => "DimensionMismatch",
            ErrorKind::InvalidInput => "InvalidInput",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Create an extraction error
    pub fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector index error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::ConfigurationError,
            Error::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Error::Extraction { .. } | Error::Io(_) => ErrorKind::ExtractionFailure,
            Error::Embedding(_) | Error::VectorDb(_) | Error::Llm(_) => {
                ErrorKind::DependencyFailure
            }
            Error::Timeout { .. } => ErrorKind::DependencyTimeout,
            Error::Http(err) if err.is_timeout() => ErrorKind::DependencyTimeout,
            Error::Http(_) => ErrorKind::DependencyFailure,
            Error::IndexNotFound(_) => ErrorKind::IndexNotFound,
            Error::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            Error::InvalidInput(_) | Error::Json(_) => ErrorKind::InvalidInput,
            Error::JobNotFound(_) => ErrorKind::NotFound,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = match kind {
            ErrorKind::InvalidInput | ErrorKind::UnsupportedFormat => StatusCode::BAD_REQUEST,
            ErrorKind::ExtractionFailure => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::DependencyFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::DependencyTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ConfigurationError
            | ErrorKind::IndexNotFound
            | ErrorKind::DimensionMismatch
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

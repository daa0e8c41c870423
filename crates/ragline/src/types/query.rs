//! Query parameters accepted at the transport boundary

use serde::Deserialize;

use crate::error::{Error, Result};

/// Query string parameters for retrieval and generation
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    /// The search query
    pub query: String,
    /// Number of results (falls back to the configured default)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    /// Reject blank queries and a zero `top_k`
    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::InvalidInput("query must not be empty".to_string()));
        }
        if self.top_k == Some(0) {
            return Err(Error::InvalidInput("top_k must be greater than zero".to_string()));
        }
        Ok(())
    }
}

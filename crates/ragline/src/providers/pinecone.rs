//! Pinecone index over the REST data plane

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::types::{ChunkId, EmbeddingRecord, Metadata};

use super::http::{build_client, error_for_status, transport_error};
use super::vector_store::{IndexMatch, IndexStats, VectorIndex};

/// Pinecone's per-request upsert limit
const UPSERT_BATCH: usize = 100;
/// Pinecone's per-request delete limit
const DELETE_BATCH: usize = 1000;

#[derive(Deserialize)]
struct DescribeIndexResponse {
    host: String,
    dimension: Option<usize>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<UpsertVector<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UpsertVector<'a> {
    id: String,
    values: &'a [f32],
    metadata: &'a Metadata,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    vectors: Vec<ListedVector>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Deserialize)]
struct ListedVector {
    id: String,
}

#[derive(Deserialize)]
struct Pagination {
    next: Option<String>,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

/// Client for one existing Pinecone index
pub struct PineconeIndex {
    client: Client,
    host: String,
    name: String,
    api_key: String,
    api_version: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    /// Resolve the index host through the control plane
    ///
    /// Fails with `IndexNotFound` if the index does not exist; indexes are
    /// never created here.
    pub async fn connect(config: &IndexConfig, timeout: Duration) -> Result<Self> {
        let name = config
            .index_name
            .clone()
            .ok_or_else(|| Error::Config("INDEX_NAME is required for the pinecone index".into()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("PINECONE_API_KEY is required for the pinecone index".into()))?;
        if let Some(environment) = &config.environment {
            tracing::debug!("Ignoring legacy Pinecone environment '{}'", environment);
        }

        let client = build_client(timeout)?;
        let url = format!(
            "{}/indexes/{}",
            config.control_plane_url.trim_end_matches('/'),
            name
        );
        let response = client
            .get(&url)
            .header("Api-Key", &api_key)
            .header("X-Pinecone-API-Version", &config.api_version)
            .send()
            .await
            .map_err(|e| {
                let context = format!("Failed to describe index '{}'", name);
                transport_error(e, &context, Error::VectorDb)
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::IndexNotFound(format!(
                "'{}' does not exist; create it before starting",
                name
            )));
        }
        let response = error_for_status(response, "Describe index failed", Error::VectorDb).await?;
        let described: DescribeIndexResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "Failed to parse index description", Error::VectorDb))?;

        tracing::info!(
            "Connected to Pinecone index '{}' at {} (dimension {:?})",
            name,
            described.host,
            described.dimension
        );

        Ok(Self {
            client,
            host: normalize_host(&described.host),
            name,
            api_key,
            api_version: config.api_version.clone(),
            namespace: config.namespace.clone(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", &self.api_version)
    }

    async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, context, Error::VectorDb))?;
        let response = error_for_status(response, context, Error::VectorDb).await?;
        response
            .json()
            .await
            .map_err(|e| {
                let context = format!("{}: invalid response", context);
                transport_error(e, &context, Error::VectorDb)
            })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Pinecone metadata may hold numbers, booleans or lists; flatten to strings
fn flatten_metadata(raw: Option<serde_json::Map<String, Value>>) -> Metadata {
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<()> {
        for batch in records.chunks(UPSERT_BATCH) {
            let request = UpsertRequest {
                vectors: batch
                    .iter()
                    .map(|r| UpsertVector {
                        id: r.id.to_string(),
                        values: &r.vector,
                        metadata: &r.metadata,
                    })
                    .collect(),
                namespace: self.namespace.as_deref(),
            };
            let _: Value = self
                .send_json(self.post("/vectors/upsert").json(&request), "Upsert failed")
                .await?;
        }
        tracing::debug!("Upserted {} vectors into '{}'", records.len(), self.name);
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        include_metadata: bool,
    ) -> Result<Vec<IndexMatch>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata,
            include_values: false,
            namespace: self.namespace.as_deref(),
        };
        let response: QueryResponse = self
            .send_json(self.post("/query").json(&request), "Query failed")
            .await?;

        Ok(response
            .matches
            .into_iter()
            .map(|m| IndexMatch {
                id: m.id,
                score: m.score,
                metadata: flatten_metadata(m.metadata),
            })
            .collect())
    }

    async fn list_chunk_ids(&self, parent_id: &str) -> Result<Vec<ChunkId>> {
        let prefix = ChunkId::prefix(parent_id);
        let mut ids = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut params = vec![("prefix", prefix.clone())];
            if let Some(ns) = &self.namespace {
                params.push(("namespace", ns.clone()));
            }
            if let Some(t) = token.take() {
                params.push(("paginationToken", t));
            }

            let page: ListResponse = self
                .send_json(self.get("/vectors/list").query(&params), "List failed")
                .await?;

            // The prefix also matches other parents whose id extends this one
            ids.extend(
                page.vectors
                    .iter()
                    .filter_map(|v| ChunkId::parse(&v.id))
                    .filter(|id| id.parent_id() == parent_id),
            );

            match page.pagination.and_then(|p| p.next) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(ids)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        for batch in ids.chunks(DELETE_BATCH) {
            let request = DeleteRequest {
                ids: batch,
                namespace: self.namespace.as_deref(),
            };
            let _: Value = self
                .send_json(self.post("/vectors/delete").json(&request), "Delete failed")
                .await?;
        }
        Ok(())
    }

    async fn describe(&self) -> Result<IndexStats> {
        let stats: StatsResponse = self
            .send_json(
                self.post("/describe_index_stats").json(&serde_json::json!({})),
                "Describe index stats failed",
            )
            .await?;
        Ok(IndexStats {
            dimension: stats.dimension,
            vector_count: stats.total_vector_count,
        })
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("docs-abc123.svc.pinecone.io"),
            "https://docs-abc123.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5081/"), "http://localhost:5081");
    }

    #[test]
    fn test_flatten_metadata() {
        let raw: serde_json::Map<String, Value> = serde_json::from_str(
            r#"{"text": "hello", "page": 3, "draft": false}"#,
        )
        .unwrap();
        let flat = flatten_metadata(Some(raw));
        assert_eq!(flat["text"], "hello");
        assert_eq!(flat["page"], "3");
        assert_eq!(flat["draft"], "false");
        assert!(flatten_metadata(None).is_empty());
    }

    #[test]
    fn test_query_request_is_camel_case() {
        let vector = [0.1f32, 0.2];
        let request = QueryRequest {
            vector: &vector,
            top_k: 2,
            include_metadata: true,
            include_values: false,
            namespace: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["topK"], 2);
        assert_eq!(value["includeMetadata"], true);
        assert!(value.get("namespace").is_none());
    }
}

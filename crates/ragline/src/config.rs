//! Configuration for the pipeline and its server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Token-window chunking
    pub chunking: ChunkingConfig,
    /// Embedding capability
    pub embeddings: EmbeddingConfig,
    /// Vector index capability
    pub index: IndexConfig,
    /// Completion capability
    pub llm: LlmConfig,
    /// Retrieval defaults
    pub retrieval: RetrievalConfig,
    /// Context assembly
    pub generation: GenerationConfig,
    /// Deadlines for external calls
    pub timeouts: TimeoutConfig,
    /// Batch and background processing
    pub processing: ProcessingConfig,
}

impl RagConfig {
    /// Load configuration: optional TOML file, then `.env`, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is not an error
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {}", e);
            }
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    /// Parse TOML configuration text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply overrides from a key lookup (normally the process environment)
    ///
    /// Recognizes the legacy `PINECONE_API_KEY`, `PINECONE_ENVIRONMENT`,
    /// `OPENAI_API_KEY` and `INDEX_NAME` variables plus `RAGLINE_*` keys.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PINECONE_API_KEY") {
            self.index.api_key = Some(v);
        }
        if let Some(v) = lookup("PINECONE_ENVIRONMENT") {
            self.index.environment = Some(v);
        }
        if let Some(v) = lookup("INDEX_NAME") {
            self.index.index_name = Some(v);
        }
        if let Some(v) = lookup("OPENAI_API_KEY") {
            self.llm.api_key.get_or_insert_with(|| v.clone());
            self.embeddings.api_key.get_or_insert(v);
        }

        if let Some(v) = lookup("RAGLINE_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("RAGLINE_PORT") {
            self.server.port = parse_override("RAGLINE_PORT", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_UPLOAD_DIR") {
            self.server.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("RAGLINE_CHUNK_SIZE") {
            self.chunking.chunk_size = parse_override("RAGLINE_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_override("RAGLINE_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_TOKENIZER_PATH") {
            self.chunking.tokenizer = TokenizerConfig::HuggingFace { path: PathBuf::from(v) };
        }
        if let Some(v) = lookup("RAGLINE_EMBEDDING_PROVIDER") {
            self.embeddings.provider = parse_override("RAGLINE_EMBEDDING_PROVIDER", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_EMBEDDING_MODEL") {
            self.embeddings.model = Some(v);
        }
        if let Some(v) = lookup("RAGLINE_EMBEDDING_DIMENSIONS") {
            self.embeddings.dimensions = parse_override("RAGLINE_EMBEDDING_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_INDEX_BACKEND") {
            self.index.backend = parse_override("RAGLINE_INDEX_BACKEND", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_LLM_PROVIDER") {
            self.llm.provider = parse_override("RAGLINE_LLM_PROVIDER", &v)?;
        }
        if let Some(v) = lookup("RAGLINE_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = lookup("RAGLINE_WORKERS") {
            self.processing.workers = Some(parse_override("RAGLINE_WORKERS", &v)?);
        }

        Ok(())
    }

    /// Check settings that would make the pipeline unusable
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunk_size must be greater than zero".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.retrieval.default_top_k == 0 {
            return Err(Error::Config("default_top_k must be greater than zero".to_string()));
        }
        if self.retrieval.max_top_k < self.retrieval.default_top_k {
            return Err(Error::Config(format!(
                "max_top_k ({}) must be at least default_top_k ({})",
                self.retrieval.max_top_k, self.retrieval.default_top_k
            )));
        }
        if self.generation.max_context_chars == 0 {
            return Err(Error::Config("max_context_chars must be greater than zero".to_string()));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embedding dimensions must be greater than zero".to_string()));
        }

        if self.index.backend == IndexBackend::Pinecone {
            if is_blank(&self.index.api_key) {
                return Err(Error::Config("PINECONE_API_KEY is required for the pinecone index".to_string()));
            }
            if is_blank(&self.index.index_name) {
                return Err(Error::Config("INDEX_NAME is required for the pinecone index".to_string()));
            }
        }
        if self.embeddings.provider == EmbeddingBackend::OpenAi && is_blank(&self.embeddings.api_key) {
            return Err(Error::Config("OPENAI_API_KEY is required for OpenAI embeddings".to_string()));
        }
        if self.llm.provider == LlmBackend::OpenAi && is_blank(&self.llm.api_key) {
            return Err(Error::Config("OPENAI_API_KEY is required for OpenAI completions".to_string()));
        }

        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", key, e)))
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
    /// Directory where uploaded files are written before processing
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024,
            upload_dir: PathBuf::from("uploads"),
        }
    }
}

/// Tokenizer used to measure chunk sizes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TokenizerConfig {
    /// Unicode word segmentation
    #[default]
    Word,
    /// HuggingFace `tokenizer.json` matching the embedding model
    #[serde(rename = "huggingface")]
    HuggingFace { path: PathBuf },
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in tokens
    pub chunk_size: usize,
    /// Tokens shared by adjacent windows
    pub chunk_overlap: usize,
    /// Tokenizer used for both measures
    pub tokenizer: TokenizerConfig,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            chunk_overlap: 50,
            tokenizer: TokenizerConfig::Word,
        }
    }
}

/// Embedding backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI embeddings API
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown embedding provider '{}'", other)),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend provider
    pub provider: EmbeddingBackend,
    /// Model identifier; unset picks the provider's default
    pub model: Option<String>,
    /// Output dimensionality (384 for MiniLM)
    pub dimensions: usize,
    /// Override for the provider's base URL
    pub base_url: Option<String>,
    /// API key (OpenAI only)
    pub api_key: Option<String>,
    /// Retries for failed embedding requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: None,
            dimensions: 384,
            base_url: None,
            api_key: None,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Configured model, or `all-minilm` / `text-embedding-3-small` by provider
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, EmbeddingBackend::Ollama) => "all-minilm",
            (None, EmbeddingBackend::OpenAi) => "text-embedding-3-small",
        }
    }

    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, EmbeddingBackend::Ollama) => DEFAULT_OLLAMA_URL,
            (None, EmbeddingBackend::OpenAi) => DEFAULT_OPENAI_URL,
        }
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Process-local index
    #[default]
    Memory,
    /// Pinecone serverless or pod index
    Pinecone,
}

impl FromStr for IndexBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "pinecone" => Ok(Self::Pinecone),
            other => Err(format!("unknown index backend '{}'", other)),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Backend
    pub backend: IndexBackend,
    /// Name of an existing index
    pub index_name: Option<String>,
    /// API key
    pub api_key: Option<String>,
    /// Legacy environment name, only logged
    pub environment: Option<String>,
    /// Namespace within the index
    pub namespace: Option<String>,
    /// Control plane used to resolve the index host
    pub control_plane_url: String,
    /// Value of the `X-Pinecone-API-Version` header
    pub api_version: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Memory,
            index_name: None,
            api_key: None,
            environment: None,
            namespace: None,
            control_plane_url: "https://api.pinecone.io".to_string(),
            api_version: "2024-07".to_string(),
        }
    }
}

/// Completion backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown llm provider '{}'", other)),
        }
    }
}

/// Completion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider
    pub provider: LlmBackend,
    /// Generation model name; unset picks the provider's default
    pub model: Option<String>,
    /// Override for the provider's base URL
    pub base_url: Option<String>,
    /// API key (OpenAI only)
    pub api_key: Option<String>,
    /// Sampling temperature; provider default when unset
    pub temperature: Option<f32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Ollama,
            model: None,
            base_url: None,
            api_key: None,
            temperature: None,
        }
    }
}

impl LlmConfig {
    /// Configured model, or `phi3` / `gpt-3.5-turbo` by provider
    pub fn model(&self) -> &str {
        match (&self.model, self.provider) {
            (Some(model), _) => model,
            (None, LlmBackend::Ollama) => "phi3",
            (None, LlmBackend::OpenAi) => "gpt-3.5-turbo",
        }
    }

    pub fn base_url(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url,
            (None, LlmBackend::Ollama) => DEFAULT_OLLAMA_URL,
            (None, LlmBackend::OpenAi) => DEFAULT_OPENAI_URL,
        }
    }
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Retrieval defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// `top_k` used when the caller gives none
    pub default_top_k: usize,
    /// Upper bound applied to caller-supplied `top_k`
    pub max_top_k: usize,
    /// Drop matches scoring below this value
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 3,
            max_top_k: 50,
            min_score: None,
        }
    }
}

/// Context assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Character budget for the context block
    pub max_context_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 12_000,
        }
    }
}

/// Deadlines for external calls, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub embed_secs: u64,
    pub upsert_secs: u64,
    pub query_secs: u64,
    pub completion_secs: u64,
    pub extraction_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embed_secs: 30,
            upsert_secs: 30,
            query_secs: 15,
            completion_secs: 120,
            extraction_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn embed(&self) -> Duration {
        Duration::from_secs(self.embed_secs)
    }

    pub fn upsert(&self) -> Duration {
        Duration::from_secs(self.upsert_secs)
    }

    pub fn query(&self) -> Duration {
        Duration::from_secs(self.query_secs)
    }

    pub fn completion(&self) -> Duration {
        Duration::from_secs(self.completion_secs)
    }

    pub fn extraction(&self) -> Duration {
        Duration::from_secs(self.extraction_secs)
    }

    /// Longest single call, used for HTTP client timeouts
    pub fn longest(&self) -> Duration {
        [
            self.embed_secs,
            self.upsert_secs,
            self.query_secs,
            self.completion_secs,
        ]
        .into_iter()
        .max()
        .map(Duration::from_secs)
        .unwrap_or_default()
    }
}

/// Batch and background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Background upload workers (default: CPU count, max 4)
    pub workers: Option<usize>,
    /// Jobs waiting for a worker before submit applies backpressure
    pub queue_capacity: usize,
    /// Documents of one batch processed concurrently
    pub max_concurrent_documents: usize,
    /// Delete chunks left over from a longer previous ingestion
    pub prune_stale_chunks: bool,
    /// Finished jobs kept for progress queries; older ones are evicted
    pub retained_jobs: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: None,
            queue_capacity: 100,
            max_concurrent_documents: 4,
            prune_stale_chunks: true,
            retained_jobs: 1000,
        }
    }
}

impl ProcessingConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| num_cpus::get().min(4)).max(1)
    }
}

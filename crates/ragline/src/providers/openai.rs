//! OpenAI embedding and chat completion providers

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::http::{build_client, error_for_status, retry_with_backoff, transport_error};
use super::llm::CompletionProvider;

fn require_key(key: &Option<String>, what: &str) -> Result<String> {
    match key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(Error::Config(format!("OPENAI_API_KEY is required for {}", what))),
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    /// Only the text-embedding-3 family accepts a requested size
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

fn supports_dimensions(model: &str) -> bool {
    model.starts_with("text-embedding-3")
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// OpenAI embeddings (`/v1/embeddings`)
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: require_key(&config.api_key, "OpenAI embeddings")?,
            model: config.model().to_string(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: supports_dimensions(&self.model).then_some(self.dimensions),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "Embedding request failed", Error::Embedding))?;
        let response = error_for_status(response, "Embedding failed", Error::Embedding).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "Failed to parse embedding response", Error::Embedding))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::embedding("API returned empty response"))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        tracing::debug!(provider = "openai", text_len = text.len(), "embedding text");
        retry_with_backoff(self.max_retries, || self.embed_once(text)).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions (`/v1/chat/completions`)
pub struct OpenAiCompletion {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: Option<f32>,
}

impl OpenAiCompletion {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            api_key: require_key(&config.api_key, "OpenAI completions")?,
            model: config.model().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "Completion request failed", Error::Llm))?;
        let response = error_for_status(response, "Completion failed", Error::Llm).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "Failed to parse completion response", Error::Llm))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::llm("Completion returned no choices"))
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models/{}", self.base_url, self.model);
        let response = self.client.get(&url).bearer_auth(&self.api_key).send().await;
        Ok(matches!(response, Ok(r) if r.status().is_success()))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

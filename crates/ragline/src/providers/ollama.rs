//! Ollama-backed embedding and completion providers

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::http::{build_client, error_for_status, retry_with_backoff, transport_error};
use super::llm::CompletionProvider;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

async fn ollama_alive(client: &Client, base_url: &str) -> bool {
    let url = format!("{}/api/tags", base_url);
    matches!(client.get(&url).send().await, Ok(r) if r.status().is_success())
}

/// Ollama embedding provider (`/api/embeddings`) with retry
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "Embedding request failed", Error::Embedding))?;
        let response = error_for_status(response, "Embedding failed", Error::Embedding).await?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "Failed to parse embedding response", Error::Embedding))?;

        if body.embedding.is_empty() {
            return Err(Error::embedding(format!(
                "Model '{}' returned an empty embedding",
                self.model
            )));
        }
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        retry_with_backoff(self.max_retries, || self.embed_once(text)).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(ollama_alive(&self.client, &self.base_url).await)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama chat provider (`/api/chat`, non-streaming)
pub struct OllamaCompletion {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
}

impl OllamaCompletion {
    pub fn new(config: &LlmConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
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
            stream: false,
            options: self.temperature.map(|temperature| ChatOptions { temperature }),
        };

        tracing::debug!("Generating answer with model: {}", self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(e, "Generation request failed", Error::Llm))?;
        let response = error_for_status(response, "Generation failed", Error::Llm).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, "Failed to parse generation response", Error::Llm))?;

        Ok(body.message.content)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(ollama_alive(&self.client, &self.base_url).await)
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

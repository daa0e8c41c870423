//! Deterministic providers shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ragline::config::RagConfig;
use ragline::ingestion::WordTokenizer;
use ragline::providers::{CompletionProvider, EmbeddingProvider, InMemoryIndex};
use ragline::{Error, RagPipeline, Result};

pub const DIM: usize = 8;

/// Bag-of-words embedder: each word adds weight to one of `DIM` buckets.
///
/// Texts containing `fail_on` are rejected.
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail_on: Option<String>,
    pub delay: Option<Duration>,
    pub dimensions: usize,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on: None,
            delay: None,
            dimensions: DIM,
        }
    }
}

impl KeywordEmbedder {
    pub fn failing_on(word: &str) -> Self {
        Self {
            fail_on: Some(word.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(word) = &self.fail_on {
            if text.contains(word.as_str()) {
                return Err(Error::embedding(format!("refusing to embed '{}'", word)));
            }
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for word in text.split_whitespace() {
            let bucket = word
                .to_lowercase()
                .bytes()
                .map(usize::from)
                .sum::<usize>()
                % self.dimensions;
            vector[bucket] += 1.0;
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Records prompts and answers with a fixed prefix, or fails on demand.
#[derive(Default)]
pub struct RecordingCompletion {
    pub prompts: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingCompletion {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().map(|(_, prompt)| prompt.clone())
    }

    pub fn last_system(&self) -> Option<String> {
        self.prompts.lock().last().map(|(system, _)| system.clone())
    }
}

#[async_trait]
impl CompletionProvider for RecordingCompletion {
    async fn complete(&self, system_instruction: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .push((system_instruction.to_string(), prompt.to_string()));
        if self.fail {
            return Err(Error::llm("model overloaded"));
        }
        Ok(format!("answer from {} prompt chars", prompt.len()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "recording"
    }

    fn model(&self) -> &str {
        "test-model"
    }
}

pub struct Harness {
    pub pipeline: RagPipeline,
    pub index: Arc<InMemoryIndex>,
    pub embedder: Arc<KeywordEmbedder>,
    pub llm: Arc<RecordingCompletion>,
}

/// Config with small chunks so short texts span several windows
pub fn test_config(upload_dir: Option<&Path>) -> RagConfig {
    let mut config = RagConfig::default();
    config.chunking.chunk_size = 3;
    config.chunking.chunk_overlap = 1;
    config.embeddings.dimensions = DIM;
    if let Some(dir) = upload_dir {
        config.server.upload_dir = dir.to_path_buf();
    }
    config.processing.workers = Some(2);
    config
}

pub async fn harness_with(
    config: RagConfig,
    embedder: KeywordEmbedder,
    llm: RecordingCompletion,
) -> Harness {
    let index = Arc::new(InMemoryIndex::new(DIM));
    let embedder = Arc::new(embedder);
    let llm = Arc::new(llm);

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedder(embedder.clone())
        .index(index.clone())
        .completion(llm.clone())
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .await
        .expect("pipeline should build");

    Harness {
        pipeline,
        index,
        embedder,
        llm,
    }
}

pub async fn harness() -> Harness {
    harness_with(
        test_config(None),
        KeywordEmbedder::default(),
        RecordingCompletion::default(),
    )
    .await
}

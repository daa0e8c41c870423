//! Retrieval followed by a single grounded completion

use std::sync::Arc;
use std::time::Duration;

use super::prompt::{PromptBuilder, SYSTEM_INSTRUCTION};
use crate::error::Result;
use crate::providers::deadline::bounded;
use crate::providers::CompletionProvider;
use crate::retrieval::Retriever;
use crate::types::RagAnswer;

/// Answers a query from retrieved context
///
/// Completion failures are not retried; they propagate to the caller.
pub struct AnswerComposer {
    retriever: Arc<Retriever>,
    llm: Arc<dyn CompletionProvider>,
    max_context_chars: usize,
    completion_timeout: Duration,
}

impl AnswerComposer {
    pub fn new(
        retriever: Arc<Retriever>,
        llm: Arc<dyn CompletionProvider>,
        max_context_chars: usize,
        completion_timeout: Duration,
    ) -> Self {
        Self {
            retriever,
            llm,
            max_context_chars,
            completion_timeout,
        }
    }

    /// Generate an answer; `top_k` defaults to the configured value (3)
    pub async fn generate(&self, query: &str, top_k: Option<usize>) -> Result<RagAnswer> {
        let top_k = top_k.unwrap_or_else(|| self.retriever.default_top_k());
        let matches = self.retriever.retrieve(query, top_k).await?;

        let texts: Vec<String> = matches.into_iter().map(|m| m.text).collect();
        let (context, used) = PromptBuilder::build_context(&texts, self.max_context_chars);
        if used < texts.len() {
            tracing::debug!(
                "Context budget of {} chars kept {} of {} chunks",
                self.max_context_chars,
                used,
                texts.len()
            );
        }
        let prompt = PromptBuilder::build_prompt(&context, query);

        tracing::info!(
            "Generating answer with {} ({}) from {} chunks",
            self.llm.name(),
            self.llm.model(),
            used
        );
        let answer = bounded(
            "completion",
            self.completion_timeout,
            self.llm.complete(SYSTEM_INSTRUCTION, &prompt),
        )
        .await?;

        let mut context_texts = texts;
        context_texts.truncate(used);
        Ok(RagAnswer {
            query: query.to_string(),
            context: context_texts,
            answer,
        })
    }
}

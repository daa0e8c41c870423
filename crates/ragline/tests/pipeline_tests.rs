//! End-to-end pipeline tests over deterministic providers

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ragline::generation::prompt::{NO_CONTEXT, SYSTEM_INSTRUCTION};
use ragline::ingestion::WordTokenizer;
use ragline::processing::{Job, JobEvent, JobStatus, UploadedFile};
use ragline::providers::{IndexMatch, IndexStats, InMemoryIndex, VectorIndex};
use ragline::server::state::AppState;
use ragline::types::{ChunkId, EmbeddingRecord};
use ragline::{ContentType, Error, ErrorKind, RagPipeline, Result, SourceDocument};

use common::{harness, harness_with, test_config, KeywordEmbedder, RecordingCompletion, DIM};

fn doc(id: &str, text: &str) -> SourceDocument {
    SourceDocument::new(id, text).unwrap()
}

#[tokio::test]
async fn test_ingest_produces_sequential_chunk_ids() {
    let h = harness().await;

    let result = h.pipeline.ingest_documents(vec![doc("doc1", "A B C D E F")]).await;

    assert_eq!(result.succeeded, vec!["doc1"]);
    assert!(result.failed.is_empty());
    assert_eq!(
        h.index.ids(),
        vec!["doc1_chunk0", "doc1_chunk1", "doc1_chunk2"]
    );
    assert_eq!(h.index.metadata("doc1_chunk1").unwrap()["text"], "C D E");
    assert_eq!(h.embedder.calls(), 3);
}

#[tokio::test]
async fn test_retrieve_respects_top_k_and_order() {
    let h = harness().await;
    h.pipeline
        .ingest_documents(vec![doc(
            "greek",
            "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda",
        )])
        .await;
    assert_eq!(h.index.len(), 5);

    let matches = h.pipeline.retrieve("gamma delta", 2).await.unwrap();

    assert!(matches.len() <= 2);
    assert!(!matches.is_empty());
    for pair in matches.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    for m in &matches {
        assert!(ChunkId::parse(&m.id).is_some());
        assert!(!m.text.is_empty());
        assert!(!m.metadata.contains_key("text"));
    }
}

#[tokio::test]
async fn test_zero_top_k_is_invalid_input() {
    let h = harness().await;
    let err = h.pipeline.retrieve("anything", 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_unsupported_file_type_is_rejected_before_embedding() {
    let h = harness().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.docx");
    std::fs::write(&path, b"binary").unwrap();

    let result = h
        .pipeline
        .ingest_file(&path, ContentType::Other("docx".to_string()))
        .await;

    assert!(result.succeeded.is_empty());
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].id, "report.docx");
    assert_eq!(result.failed[0].reason, ErrorKind::UnsupportedFormat);
    assert_eq!(h.embedder.calls(), 0);
    assert!(h.index.is_empty());
}

#[tokio::test]
async fn test_one_bad_document_does_not_block_others() {
    let h = harness_with(
        test_config(None),
        KeywordEmbedder::failing_on("poison"),
        RecordingCompletion::default(),
    )
    .await;

    let docs = vec![
        doc("first", "one two three four"),
        doc("second", "this text is poison"),
        doc("third", "five six seven"),
    ];
    let result = h.pipeline.ingest_documents(docs).await;

    assert_eq!(result.succeeded, vec!["first", "third"]);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].id, "second");
    assert_eq!(result.failed[0].reason, ErrorKind::DependencyFailure);
    assert!(h.index.ids().iter().all(|id| !id.starts_with("second")));
    assert!(h.index.ids().contains(&"third_chunk0".to_string()));
}

#[tokio::test]
async fn test_generate_on_empty_index_uses_sentinel_context() {
    let h = harness().await;

    let answer = h.pipeline.generate("what is in the archive?", None).await.unwrap();

    assert!(answer.context.is_empty());
    assert!(answer.answer.starts_with("answer from"));
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.contains(NO_CONTEXT));
    assert!(prompt.contains("Question: what is in the archive?"));
    assert_eq!(h.llm.last_system().unwrap(), SYSTEM_INSTRUCTION);
}

#[tokio::test]
async fn test_generate_grounds_prompt_on_retrieved_chunks() {
    let h = harness().await;
    h.pipeline
        .ingest_documents(vec![doc("doc1", "A B C D E F")])
        .await;

    let answer = h.pipeline.generate("C D", Some(2)).await.unwrap();

    assert_eq!(answer.query, "C D");
    assert!(!answer.context.is_empty());
    assert!(answer.context.len() <= 2);
    let prompt = h.llm.last_prompt().unwrap();
    assert!(prompt.starts_with("Context:\n"));
    assert!(prompt.ends_with("Question: C D\n\nAnswer:"));
    for text in &answer.context {
        assert!(prompt.contains(text.as_str()));
    }
}

#[tokio::test]
async fn test_completion_failure_propagates_without_retry() {
    let h = harness_with(
        test_config(None),
        KeywordEmbedder::default(),
        RecordingCompletion::failing(),
    )
    .await;

    let err = h.pipeline.generate("anything", None).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    assert_eq!(h.llm.prompts.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_embedding_times_out() {
    let mut config = test_config(None);
    config.timeouts.embed_secs = 1;
    let embedder = KeywordEmbedder {
        delay: Some(Duration::from_secs(60)),
        ..KeywordEmbedder::default()
    };
    let h = harness_with(config, embedder, RecordingCompletion::default()).await;

    let err = h.pipeline.retrieve("slow", 3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyTimeout);
}

#[tokio::test]
async fn test_builder_rejects_dimension_mismatch() {
    let err = RagPipeline::builder()
        .config(test_config(None))
        .embedder(Arc::new(KeywordEmbedder::default()))
        .index(Arc::new(InMemoryIndex::new(DIM * 2)))
        .completion(Arc::new(RecordingCompletion::default()))
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

#[tokio::test]
async fn test_builder_rejects_invalid_chunking() {
    let mut config = test_config(None);
    config.chunking.chunk_overlap = config.chunking.chunk_size;

    let err = RagPipeline::builder()
        .config(config)
        .embedder(Arc::new(KeywordEmbedder::default()))
        .index(Arc::new(InMemoryIndex::new(DIM)))
        .completion(Arc::new(RecordingCompletion::default()))
        .build()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::ConfigurationError);
}

/// Index whose control plane reports it missing
struct MissingIndex;

#[async_trait]
impl VectorIndex for MissingIndex {
    async fn upsert(&self, _records: &[EmbeddingRecord]) -> Result<()> {
        Ok(())
    }

    async fn query(&self, _vector: &[f32], _top_k: usize, _meta: bool) -> Result<Vec<IndexMatch>> {
        Ok(Vec::new())
    }

    async fn list_chunk_ids(&self, _parent_id: &str) -> Result<Vec<ChunkId>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _ids: &[String]) -> Result<()> {
        Ok(())
    }

    async fn describe(&self) -> Result<IndexStats> {
        Err(Error::IndexNotFound("docs".to_string()))
    }

    fn name(&self) -> &str {
        "missing"
    }
}

#[tokio::test]
async fn test_builder_surfaces_missing_index() {
    let err = RagPipeline::builder()
        .config(test_config(None))
        .embedder(Arc::new(KeywordEmbedder::default()))
        .index(Arc::new(MissingIndex))
        .completion(Arc::new(RecordingCompletion::default()))
        .tokenizer(Arc::new(WordTokenizer))
        .build()
        .await
        .err()
        .unwrap();

    assert_eq!(err.kind(), ErrorKind::IndexNotFound);
}

#[tokio::test]
async fn test_health_reports_index_size() {
    let h = harness().await;
    h.pipeline
        .ingest_documents(vec![doc("doc1", "A B C D E F")])
        .await;

    let health = h.pipeline.health().await;
    assert!(health.all_healthy());
    assert_eq!(health.vector_count, Some(3));
}

#[tokio::test]
async fn test_uploaded_file_is_ingested_in_background() {
    let uploads = tempfile::tempdir().unwrap();
    let h = harness_with(
        test_config(Some(uploads.path())),
        KeywordEmbedder::default(),
        RecordingCompletion::default(),
    )
    .await;
    let index = Arc::clone(&h.index);
    let state = AppState::from_pipeline(Arc::new(h.pipeline)).await.unwrap();

    let job_id = uuid::Uuid::new_v4();
    let workspace = uploads.path().join(job_id.to_string());
    std::fs::create_dir(&workspace).unwrap();
    let path = workspace.join("notes.txt");
    std::fs::write(&path, "A B C D E F").unwrap();
    let job = Job::with_workspace(
        job_id,
        vec![UploadedFile {
            filename: "notes.txt".to_string(),
            path,
            content_type: ContentType::Text,
        }],
        workspace.clone(),
    );

    let mut events = state.job_queue().subscribe();
    let job_id = state.job_queue().submit(job).await.unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(JobEvent::Completed { job_id: id, .. }) if id == job_id => return true,
                Ok(JobEvent::Failed { job_id: id, .. }) if id == job_id => return false,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap();
    assert!(finished);

    let progress = state.job_queue().get_progress(job_id).unwrap();
    assert_eq!(progress.status, JobStatus::Complete);
    assert_eq!(progress.succeeded, vec!["notes.txt"]);
    assert_eq!(progress.files_processed, 1);
    assert_eq!(progress.percent_complete(), 100.0);
    assert!(!workspace.exists());
    assert!(uploads.path().exists());

    assert_eq!(
        index.ids(),
        vec!["notes.txt_chunk0", "notes.txt_chunk1", "notes.txt_chunk2"]
    );
    let meta = index.metadata("notes.txt_chunk0").unwrap();
    assert_eq!(meta["filename"], "notes.txt");
    assert_eq!(meta["content_type"], "text");
}

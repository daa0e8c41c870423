//! Application state for the HTTP server

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::pipeline::RagPipeline;
use crate::processing::{JobQueue, ProcessingWorker};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: Arc<RagPipeline>,
    job_queue: Arc<JobQueue>,
    upload_dir: PathBuf,
    ready: AtomicBool,
}

impl AppState {
    /// Build the pipeline from configuration and start the workers
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing application state (index: {:?}, embeddings: {:?}, llm: {:?})",
            config.index.backend,
            config.embeddings.provider,
            config.llm.provider
        );
        let pipeline = RagPipeline::from_config(config).await?;
        Self::from_pipeline(Arc::new(pipeline)).await
    }

    /// Wrap an assembled pipeline and start its background workers
    pub async fn from_pipeline(pipeline: Arc<RagPipeline>) -> Result<Self> {
        let config = pipeline.config();
        let upload_dir = config.server.upload_dir.clone();
        tokio::fs::create_dir_all(&upload_dir).await.map_err(|e| {
            Error::Config(format!(
                "Failed to create upload directory {}: {}",
                upload_dir.display(),
                e
            ))
        })?;

        let worker_count = config.processing.worker_count();
        let (job_queue, receiver) = JobQueue::new(
            worker_count,
            config.processing.queue_capacity,
            config.processing.retained_jobs,
        );
        let job_queue = Arc::new(job_queue);
        ProcessingWorker::new(Arc::clone(&pipeline), Arc::clone(&job_queue), worker_count)
            .spawn(receiver);

        let state = Self {
            inner: Arc::new(AppStateInner {
                pipeline,
                job_queue,
                upload_dir,
                ready: AtomicBool::new(false),
            }),
        };
        state.set_ready(true);
        Ok(state)
    }

    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.inner.pipeline
    }

    pub fn config(&self) -> &RagConfig {
        self.inner.pipeline.config()
    }

    pub fn job_queue(&self) -> &Arc<JobQueue> {
        &self.inner.job_queue
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.inner.upload_dir
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::SeqCst);
    }
}

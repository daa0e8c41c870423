//! Background workers draining the job queue

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::pipeline::RagPipeline;

use super::job_queue::{Job, JobQueue};

/// Pool of workers ingesting uploaded files
pub struct ProcessingWorker {
    pipeline: Arc<RagPipeline>,
    job_queue: Arc<JobQueue>,
    worker_count: usize,
}

impl ProcessingWorker {
    pub fn new(pipeline: Arc<RagPipeline>, job_queue: Arc<JobQueue>, worker_count: usize) -> Self {
        Self {
            pipeline,
            job_queue,
            worker_count: worker_count.max(1),
        }
    }

    /// Spawn the workers; they exit once every queue sender is dropped
    pub fn spawn(self, receiver: mpsc::Receiver<Job>) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));
        tracing::info!("Starting {} processing workers", self.worker_count);

        (0..self.worker_count)
            .map(|worker_id| {
                let receiver = Arc::clone(&receiver);
                let pipeline = Arc::clone(&self.pipeline);
                let job_queue = Arc::clone(&self.job_queue);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next job
                        let job = receiver.lock().await.recv().await;
                        let Some(job) = job else { break };
                        process_job(worker_id, &pipeline, &job_queue, job).await;
                    }
                    tracing::debug!("Processing worker {} stopped", worker_id);
                })
            })
            .collect()
    }
}

async fn process_job(worker_id: usize, pipeline: &RagPipeline, job_queue: &JobQueue, job: Job) {
    let job_id = job.id;
    tracing::info!(
        "Worker {} processing job {} with {} files",
        worker_id,
        job_id,
        job.files.len()
    );
    job_queue.start(job_id);

    for file in &job.files {
        job_queue.update_current_file(job_id, &file.filename);
        let result = pipeline
            .ingest_file(&file.path, file.content_type.clone())
            .await;

        if result.is_complete_success() {
            tracing::info!("Processed file: {}", file.filename);
        } else {
            for failure in &result.failed {
                tracing::error!(
                    "Failed to process {}: {} ({})",
                    failure.id,
                    failure.message,
                    failure.reason
                );
            }
        }
        job_queue.record_file(job_id, &file.filename, result);

        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            tracing::debug!("Could not remove upload {}: {}", file.path.display(), e);
        }
    }

    if let Some(workspace) = &job.workspace {
        if let Err(e) = tokio::fs::remove_dir_all(workspace).await {
            tracing::warn!("Could not remove job directory {}: {}", workspace.display(), e);
        }
    }

    job_queue.complete(job_id);
    tracing::info!("Job {} completed", job_id);
}

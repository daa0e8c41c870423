//! Job queue for background file ingestion
//!
//! Submitting returns a job id immediately; progress is queryable by id and
//! observable through [`JobEvent`]s.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::ContentType;
use crate::types::{FailedItem, IngestResult};

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// A file saved to disk and waiting for ingestion
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original file name, used as the document id
    pub filename: String,
    /// Where the upload was written
    pub path: PathBuf,
    pub content_type: ContentType,
}

/// A processing job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub files: Vec<UploadedFile>,
    /// Directory owned by the job, removed once it finishes
    pub workspace: Option<PathBuf>,
}

impl Job {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self {
            id: Uuid::new_v4(),
            files,
            workspace: None,
        }
    }

    /// A job whose files live in `workspace`
    pub fn with_workspace(id: Uuid, files: Vec<UploadedFile>, workspace: PathBuf) -> Self {
        Self {
            id,
            files,
            workspace: Some(workspace),
        }
    }
}

/// Progress information for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub total_files: usize,
    pub files_processed: usize,
    pub files_failed: usize,
    pub current_file: Option<String>,
    /// Documents stored so far
    pub succeeded: Vec<String>,
    /// Documents that failed, with classified reasons
    pub failed: Vec<FailedItem>,
    /// Job-level failure, distinct from per-file failures
    pub error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl JobProgress {
    pub fn new(job_id: Uuid, total_files: usize) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            total_files,
            files_processed: 0,
            files_failed: 0,
            current_file: None,
            succeeded: Vec::new(),
            failed: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn percent_complete(&self) -> f32 {
        if self.total_files == 0 {
            return 100.0;
        }
        (self.files_processed + self.files_failed) as f32 / self.total_files as f32 * 100.0
    }
}

/// Lifecycle notifications for subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Queued { job_id: Uuid, total_files: usize },
    Started { job_id: Uuid },
    FileFinished { job_id: Uuid, filename: String, succeeded: bool },
    Completed { job_id: Uuid, succeeded: usize, failed: usize },
    Failed { job_id: Uuid, error: String },
}

/// Job queue for managing background processing
pub struct JobQueue {
    /// Active and finished jobs with progress
    jobs: Arc<DashMap<Uuid, JobProgress>>,
    /// Channel for sending jobs to workers
    sender: mpsc::Sender<Job>,
    events: broadcast::Sender<JobEvent>,
    worker_count: usize,
    /// Jobs submitted but not finished
    queue_size: Arc<AtomicUsize>,
    /// Finished job ids, oldest first
    finished: Mutex<VecDeque<Uuid>>,
    /// Finished jobs kept before the oldest is evicted
    retained: usize,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` waiting jobs and the
    /// progress of the `retained` most recently finished ones
    pub fn new(
        worker_count: usize,
        capacity: usize,
        retained: usize,
    ) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (events, _) = broadcast::channel(256);

        let queue = Self {
            jobs: Arc::new(DashMap::new()),
            sender,
            events,
            worker_count,
            queue_size: Arc::new(AtomicUsize::new(0)),
            finished: Mutex::new(VecDeque::new()),
            retained: retained.max(1),
        };

        (queue, receiver)
    }

    /// Submit a job; waits for queue capacity and returns its id
    pub async fn submit(&self, job: Job) -> Result<Uuid> {
        let job_id = job.id;
        let total_files = job.files.len();

        self.jobs.insert(job_id, JobProgress::new(job_id, total_files));
        self.queue_size.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.sender.send(job).await {
            tracing::error!("Failed to submit job {}: {}", job_id, e);
            self.fail(job_id, "processing workers are not running");
            return Err(Error::internal(format!("failed to queue job {}", job_id)));
        }

        tracing::info!("Queued job {} with {} files", job_id, total_files);
        self.emit(JobEvent::Queued { job_id, total_files });
        Ok(job_id)
    }

    /// Subscribe to job lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Get job progress
    pub fn get_progress(&self, job_id: Uuid) -> Option<JobProgress> {
        self.jobs.get(&job_id).map(|p| p.clone())
    }

    /// Get all jobs, newest first
    pub fn list_jobs(&self) -> Vec<JobProgress> {
        let mut jobs: Vec<JobProgress> = self.jobs.iter().map(|e| e.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Mark a job as picked up by a worker
    pub fn start(&self, job_id: Uuid) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.status = JobStatus::Processing;
            progress.updated_at = chrono::Utc::now();
        }
        self.emit(JobEvent::Started { job_id });
    }

    /// Update current file being processed
    pub fn update_current_file(&self, job_id: Uuid, filename: &str) {
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            progress.current_file = Some(filename.to_string());
            progress.updated_at = chrono::Utc::now();
        }
    }

    /// Record the outcome of one file
    pub fn record_file(&self, job_id: Uuid, filename: &str, result: IngestResult) {
        let succeeded = result.is_complete_success();
        if let Some(mut progress) = self.jobs.get_mut(&job_id) {
            if succeeded {
                progress.files_processed += 1;
            } else {
                progress.files_failed += 1;
            }
            progress.succeeded.extend(result.succeeded);
            progress.failed.extend(result.failed);
            progress.updated_at = chrono::Utc::now();
        }
        self.emit(JobEvent::FileFinished {
            job_id,
            filename: filename.to_string(),
            succeeded,
        });
    }

    /// Mark a job complete; per-file failures do not fail the job
    pub fn complete(&self, job_id: Uuid) {
        let counts = self.finish(job_id, JobStatus::Complete, None);
        if let Some((succeeded, failed)) = counts {
            self.emit(JobEvent::Completed {
                job_id,
                succeeded,
                failed,
            });
        }
    }

    /// Mark a job failed as a whole
    pub fn fail(&self, job_id: Uuid, error: &str) {
        if self
            .finish(job_id, JobStatus::Failed, Some(error.to_string()))
            .is_some()
        {
            self.emit(JobEvent::Failed {
                job_id,
                error: error.to_string(),
            });
        }
    }

    fn finish(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<String>,
    ) -> Option<(usize, usize)> {
        let mut progress = self.jobs.get_mut(&job_id)?;
        if progress.status.is_finished() {
            return None;
        }
        progress.status = status;
        progress.error = error;
        progress.current_file = None;
        progress.updated_at = chrono::Utc::now();
        let counts = (progress.succeeded.len(), progress.failed.len());
        drop(progress);

        self.queue_size.fetch_sub(1, Ordering::SeqCst);
        self.retire(job_id);
        Some(counts)
    }

    /// Record a finished job and evict the oldest beyond the retention limit
    fn retire(&self, job_id: Uuid) {
        let mut finished = self.finished.lock();
        finished.push_back(job_id);
        while finished.len() > self.retained {
            if let Some(evicted) = finished.pop_front() {
                self.jobs.remove(&evicted);
                tracing::debug!("Evicted finished job {}", evicted);
            }
        }
    }

    /// Get queue statistics
    pub fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_jobs: self.jobs.len(),
            queued: self.queue_size.load(Ordering::SeqCst),
            worker_count: self.worker_count,
            ..QueueStats::default()
        };
        for job in self.jobs.iter() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Complete => stats.complete += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// Queue statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub total_jobs: usize,
    /// Submitted and not yet finished
    pub queued: usize,
    pub pending: usize,
    pub processing: usize,
    pub complete: usize,
    pub failed: usize,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            filename: name.to_string(),
            path: PathBuf::from(name),
            content_type: ContentType::Text,
        }
    }

    #[tokio::test]
    async fn test_submit_and_progress() {
        let (queue, mut receiver) = JobQueue::new(2, 4, 10);
        let mut events = queue.subscribe();

        let job_id = queue
            .submit(Job::new(vec![upload("a.txt"), upload("b.txt")]))
            .await
            .unwrap();
        let job = receiver.recv().await.unwrap();
        assert_eq!(job.id, job_id);
        assert!(matches!(events.recv().await.unwrap(), JobEvent::Queued { total_files: 2, .. }));

        queue.start(job_id);
        queue.record_file(job_id, "a.txt", IngestResult::success("a.txt"));
        queue.record_file(
            job_id,
            "b.txt",
            IngestResult::failure("b.txt", &Error::extraction("b.txt", "bad bytes")),
        );
        queue.complete(job_id);

        let progress = queue.get_progress(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Complete);
        assert_eq!(progress.files_processed, 1);
        assert_eq!(progress.files_failed, 1);
        assert_eq!(progress.succeeded, vec!["a.txt"]);
        assert_eq!(progress.failed[0].id, "b.txt");
        assert_eq!(progress.percent_complete(), 100.0);

        let stats = queue.stats();
        assert_eq!(stats.complete, 1);
        assert_eq!(stats.queued, 0);
    }

    #[tokio::test]
    async fn test_finish_is_idempotent() {
        let (queue, _receiver) = JobQueue::new(1, 1, 10);
        let job_id = queue.submit(Job::new(vec![upload("a.txt")])).await.unwrap();

        queue.fail(job_id, "boom");
        queue.complete(job_id);

        let progress = queue.get_progress(job_id).unwrap();
        assert_eq!(progress.status, JobStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("boom"));
        assert_eq!(queue.stats().queued, 0);
    }

    #[tokio::test]
    async fn test_submit_without_workers_fails() {
        let (queue, receiver) = JobQueue::new(1, 1, 10);
        drop(receiver);

        assert!(queue.submit(Job::new(vec![upload("a.txt")])).await.is_err());
        let jobs = queue.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_finished_jobs_beyond_retention_are_evicted() {
        let (queue, _receiver) = JobQueue::new(1, 8, 2);

        let mut ids = Vec::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let job_id = queue.submit(Job::new(vec![upload(name)])).await.unwrap();
            ids.push(job_id);
        }
        let running = queue.submit(Job::new(vec![upload("d.txt")])).await.unwrap();

        for &job_id in &ids {
            queue.complete(job_id);
        }

        assert!(queue.get_progress(ids[0]).is_none());
        assert!(queue.get_progress(ids[1]).is_some());
        assert!(queue.get_progress(ids[2]).is_some());
        // Unfinished jobs are never evicted
        assert!(queue.get_progress(running).is_some());
        assert_eq!(queue.stats().total_jobs, 3);
    }
}

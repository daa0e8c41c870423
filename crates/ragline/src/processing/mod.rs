//! Background processing of uploaded files with progress tracking

mod job_queue;
mod worker;

pub use job_queue::{
    Job, JobEvent, JobProgress, JobQueue, JobStatus, QueueStats, UploadedFile,
};
pub use worker::ProcessingWorker;

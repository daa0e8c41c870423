//! Job progress endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::processing::{JobProgress, QueueStats};
use crate::server::state::AppState;

/// Response for GET /api/jobs
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobProgress>,
    pub stats: QueueStats,
}

/// Progress with a computed completion percentage
#[derive(Debug, Serialize)]
pub struct JobProgressResponse {
    #[serde(flatten)]
    pub progress: JobProgress,
    pub percent_complete: f32,
}

/// GET /api/jobs - List all jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobListResponse> {
    let queue = state.job_queue();
    Json(JobListResponse {
        jobs: queue.list_jobs(),
        stats: queue.stats(),
    })
}

/// GET /api/jobs/:id - Get job progress
pub async fn get_job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobProgressResponse>> {
    let progress = state
        .job_queue()
        .get_progress(job_id)
        .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

    Ok(Json(JobProgressResponse {
        percent_complete: progress.percent_complete(),
        progress,
    }))
}

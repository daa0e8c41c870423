//! Document ingestion endpoints

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ingestion::ContentType;
use crate::processing::{Job, UploadedFile};
use crate::server::state::AppState;
use crate::types::{IngestResult, SourceDocument};

/// Acknowledgment for a queued upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub job_id: Uuid,
    pub files: Vec<String>,
}

/// Result of a synchronous document batch
#[derive(Debug, Serialize)]
pub struct AddDocumentsResponse {
    pub message: String,
    #[serde(flatten)]
    pub result: IngestResult,
}

/// POST /api/upload - Save files and queue them for ingestion
///
/// Returns as soon as the files are on disk; poll `/api/jobs/:id` for the
/// outcome. Files are written to a per-job directory that is removed when
/// the job finishes or the upload is rejected.
pub async fn upload_files(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let job_id = Uuid::new_v4();
    let job_dir = state.upload_dir().join(job_id.to_string());
    tokio::fs::create_dir_all(&job_dir)
        .await
        .map_err(|e| storage_error(&job_dir, e))?;

    let files = match save_files(multipart, &job_dir).await {
        Ok(files) => files,
        Err(e) => {
            discard(&job_dir).await;
            return Err(e);
        }
    };

    let names = files.iter().map(|f| f.filename.clone()).collect();
    let job = Job::with_workspace(job_id, files, job_dir.clone());
    let job_id = match state.job_queue().submit(job).await {
        Ok(job_id) => job_id,
        Err(e) => {
            discard(&job_dir).await;
            return Err(e);
        }
    };

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            message: "Received; processing in background".to_string(),
            job_id,
            files: names,
        }),
    ))
}

/// Write every named part into `job_dir`; file names must be unique
async fn save_files(mut multipart: Multipart, job_dir: &Path) -> Result<Vec<UploadedFile>> {
    let mut files: Vec<UploadedFile> = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().and_then(sanitize_filename) else {
            tracing::debug!("Skipping multipart field without a usable file name");
            continue;
        };
        if files.iter().any(|f| f.filename == filename) {
            return Err(Error::InvalidInput(format!(
                "File '{}' appears more than once in the upload",
                filename
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(format!("Failed to read {}: {}", filename, e)))?;

        let path = job_dir.join(&filename);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| storage_error(&path, e))?;
        tracing::info!("Received file: {} ({} bytes)", filename, data.len());

        files.push(UploadedFile {
            content_type: ContentType::from_path(&path),
            filename,
            path,
        });
    }

    if files.is_empty() {
        return Err(Error::InvalidInput("No files provided".to_string()));
    }
    Ok(files)
}

/// Local disk failures are the server's fault, not the client's
fn storage_error(path: &Path, e: std::io::Error) -> Error {
    Error::internal(format!("Failed to store upload at {}: {}", path.display(), e))
}

async fn discard(job_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
        tracing::warn!("Could not remove upload directory {}: {}", job_dir.display(), e);
    }
}

/// Keep only the final path component of a client-supplied name
fn sanitize_filename(name: &str) -> Option<String> {
    let base = Path::new(name).file_name()?.to_str()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// POST /api/documents - Ingest raw documents synchronously
pub async fn add_documents(
    State(state): State<AppState>,
    Json(documents): Json<Vec<SourceDocument>>,
) -> Result<Json<AddDocumentsResponse>> {
    if documents.is_empty() {
        return Err(Error::InvalidInput("No documents provided".to_string()));
    }

    let result = state.pipeline().ingest_documents(documents).await;
    let message = if result.is_complete_success() {
        "Documents added successfully".to_string()
    } else {
        format!(
            "Added {} documents, {} failed",
            result.succeeded.len(),
            result.failed.len()
        )
    };

    Ok(Json(AddDocumentsResponse { message, result }))
}

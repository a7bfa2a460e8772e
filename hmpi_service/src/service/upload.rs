//! `POST /process-csv` handler.
//!
//! The upload is streamed into a named temp file inside the configured
//! upload directory, then scored on a blocking worker thread. The temp file
//! handle is owned by whichever step currently needs it, so it is deleted
//! when that step finishes, whether it succeeded, failed, or panicked.

use std::fmt;
use std::io;
use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::ingest::process_reader;
use crate::logging::{self, Component};
use crate::model::{IngestError, ResultRow};
use crate::service::AppState;

/// Multipart field carrying the sample sheet.
pub const FILE_FIELD: &str = "file";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong while handling an upload. Each variant maps
/// to a status code and a `{"error": ...}` body.
#[derive(Debug)]
pub enum ServiceError {
    /// No `file` part in the request (or not a multipart request at all).
    NoFile,
    /// A `file` part was sent with an empty filename.
    NoSelectedFile,
    /// The multipart stream itself was malformed or too large.
    Upload { status: StatusCode, message: String },
    /// The upload could not be written to the staging directory.
    Staging(String),
    /// The sheet could not be read or scored.
    Ingest(IngestError),
    /// Worker thread failure.
    Internal(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NoFile | ServiceError::NoSelectedFile => StatusCode::BAD_REQUEST,
            ServiceError::Upload { status, .. } => *status,
            ServiceError::Staging(_) | ServiceError::Ingest(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NoFile => write!(f, "No file uploaded"),
            ServiceError::NoSelectedFile => write!(f, "No selected file"),
            ServiceError::Upload { message, .. } => write!(f, "{}", message),
            ServiceError::Staging(msg) => write!(f, "Could not stage upload: {}", msg),
            ServiceError::Ingest(err) => write!(f, "{}", err),
            ServiceError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<io::Error> for ServiceError {
    fn from(err: io::Error) -> Self {
        ServiceError::Staging(err.to_string())
    }
}

impl From<MultipartError> for ServiceError {
    fn from(err: MultipartError) -> Self {
        ServiceError::Upload {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// CORS preflight. Headers are added by the router's response layer.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Streams the `file` part into a temp file. Returns the client-side file
/// name and the staged file.
async fn stage_upload(
    multipart: &mut Multipart,
    state: &AppState,
) -> Result<(String, NamedTempFile), ServiceError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = match field.file_name() {
            None => return Err(ServiceError::NoFile),
            Some("") => return Err(ServiceError::NoSelectedFile),
            Some(name) => name.to_string(),
        };

        let staged = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(&state.upload_dir)?;

        // Chunks go through tokio's file handle so the writes run on the
        // blocking pool, not the reactor thread.
        let mut writer = tokio::fs::File::from_std(staged.as_file().try_clone()?);
        let mut bytes = 0usize;
        while let Some(chunk) = field.chunk().await? {
            writer.write_all(&chunk).await?;
            bytes += chunk.len();
        }
        writer.flush().await?;

        logging::debug(
            Component::Upload,
            Some(&file_name),
            &format!("Staged {} bytes at {}", bytes, staged.path().display()),
        );
        return Ok((file_name, staged));
    }

    Err(ServiceError::NoFile)
}

/// Scores a staged upload, then deletes it.
fn score_staged(
    file_name: &str,
    staged: NamedTempFile,
    state: &AppState,
) -> Result<Vec<ResultRow>, IngestError> {
    let result = staged
        .reopen()
        .map_err(IngestError::from)
        .and_then(|file| process_reader(file, file_name, state.policy));

    if let Err(e) = staged.close() {
        logging::warn(
            Component::Upload,
            Some(file_name),
            &format!("Failed to remove staged upload: {}", e),
        );
    }
    result
}

pub async fn process_csv(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ResultRow>>, ServiceError> {
    let mut multipart = multipart.map_err(|_| ServiceError::NoFile)?;

    let (file_name, staged) = match stage_upload(&mut multipart, &state).await {
        Ok(staged) => staged,
        Err(err) => {
            logging::warn(Component::Upload, None, &format!("Rejected upload: {}", err));
            return Err(err);
        }
    };

    let worker_state = Arc::clone(&state);
    let worker_name = file_name.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        score_staged(&worker_name, staged, &worker_state)
    })
    .await
    .map_err(|e| ServiceError::Internal(e.to_string()))?;

    match outcome {
        Ok(rows) => {
            logging::info(
                Component::Server,
                Some(&file_name),
                &format!("Returned {} rows", rows.len()),
            );
            Ok(Json(rows))
        }
        Err(err) => {
            logging::log_ingest_failure(&file_name, "Processing upload", &err);
            Err(ServiceError::Ingest(err))
        }
    }
}

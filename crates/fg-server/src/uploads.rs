//! Upload endpoints

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fg_uploads::{remove_file, DeleteOutcome, UploadError, UploadedFiles};
use tracing::info;

use crate::AppState;

fn error_response(status: StatusCode, identifier: &str, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({
            "_type": "Error",
            "errorIdentifier": format!("urn:filegate:errors:{}", identifier),
            "message": message,
        })),
    )
        .into_response()
}

/// `POST /uploads`
pub async fn upload_one(State(state): State<Arc<AppState>>, files: UploadedFiles) -> Response {
    match files.single() {
        Some(file) => {
            info!(filename = %file.filename, size = file.size, "File uploaded");
            (StatusCode::CREATED, Json(file.clone())).into_response()
        }
        None => error_response(
            StatusCode::BAD_REQUEST,
            "MissingFile",
            format!("No file in field '{}'", state.config.uploads.field_name),
        ),
    }
}

/// `POST /uploads/batch`
pub async fn upload_batch(files: UploadedFiles) -> (StatusCode, Json<UploadedFiles>) {
    info!(files = files.len(), "Batch uploaded");
    (StatusCode::CREATED, Json(files))
}

/// Stored names are flat, so anything that is not one plain segment is refused
fn is_single_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// `DELETE /uploads/:filename`
pub async fn delete_upload(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    if !is_single_segment(&filename) {
        return UploadError::InvalidPath(filename).into_response();
    }

    let path = PathBuf::from(&state.config.uploads.destination).join(&filename);
    match remove_file(&path).await {
        DeleteOutcome::Deleted => StatusCode::NO_CONTENT.into_response(),
        DeleteOutcome::NotFound => error_response(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("No stored file named '{}'", filename),
        ),
        DeleteOutcome::PermissionDenied | DeleteOutcome::Failed(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "InternalError",
            "Failed to delete file".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment() {
        assert!(is_single_segment("0f8e-file.png"));
        assert!(is_single_segment("no-extension"));
        assert!(!is_single_segment(""));
        assert!(!is_single_segment(".."));
        assert!(!is_single_segment("../secret"));
        assert!(!is_single_segment("nested/file.png"));
        assert!(!is_single_segment("nested\\file.png"));
    }
}

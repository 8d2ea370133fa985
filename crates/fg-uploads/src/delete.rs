//! File deletion helper

use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, warn};

/// What happened to a removal attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    PermissionDenied,
    Failed(String),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// Remove a file with a single attempt and report the outcome.
///
/// There is no existence check before the removal, so a file that vanishes
/// concurrently is reported as `NotFound` rather than raising.
pub async fn remove_file(path: impl AsRef<Path>) -> DeleteOutcome {
    let path = path.as_ref();

    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = ?path, "File deleted");
            DeleteOutcome::Deleted
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Failed to delete file");
            match e.kind() {
                ErrorKind::NotFound => DeleteOutcome::NotFound,
                ErrorKind::PermissionDenied => DeleteOutcome::PermissionDenied,
                _ => DeleteOutcome::Failed(e.to_string()),
            }
        }
    }
}

/// Remove a file, returning `true` only if it was deleted. Failures are logged.
pub async fn delete_file(path: impl AsRef<Path>) -> bool {
    remove_file(path).await.is_deleted()
}

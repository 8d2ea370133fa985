//! MIME type filtering
//!
//! Resolves requested categories and explicit MIME types into one allow-list.

use tracing::debug;

use crate::error::{UploadError, UploadResult};
use crate::mime_types::{self, FileCategory};
use crate::model::IncomingFile;

/// The effective allow-list for an upload field. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeFilter {
    allowed: Vec<String>,
}

impl MimeFilter {
    /// Resolve the allow-list.
    ///
    /// Non-empty `custom_mime_types` replace the categories outright. Otherwise
    /// each known category in `file_types` contributes its list in order.
    /// Nothing resolved means everything in the `all` category.
    pub fn resolve<T, C>(file_types: &[T], custom_mime_types: &[C]) -> Self
    where
        T: AsRef<str>,
        C: AsRef<str>,
    {
        if !custom_mime_types.is_empty() {
            return Self {
                allowed: custom_mime_types
                    .iter()
                    .map(|m| m.as_ref().to_string())
                    .collect(),
            };
        }

        let mut allowed = Vec::new();
        for name in file_types {
            match mime_types::mime_types_for(name.as_ref()) {
                Some(types) => allowed.extend(types.iter().map(|m| m.to_string())),
                None => debug!(file_type = name.as_ref(), "Ignoring unknown file type category"),
            }
        }

        if allowed.is_empty() {
            return Self::all();
        }
        Self { allowed }
    }

    /// Filter accepting every registered MIME type
    pub fn all() -> Self {
        Self {
            allowed: FileCategory::All
                .mime_types()
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Membership test on the type's essence: parameters dropped, case ignored
    pub fn accepts(&self, mime_type: &str) -> bool {
        let wanted = essence(mime_type);
        self.allowed
            .iter()
            .any(|allowed| essence(allowed).eq_ignore_ascii_case(wanted))
    }

    /// Per-file filter hook, run before the file is stored
    pub fn check(&self, file: &IncomingFile) -> UploadResult<()> {
        if self.accepts(&file.mime_type) {
            return Ok(());
        }
        Err(UploadError::InvalidFileType {
            field: file.field_name.clone(),
            mime_type: file.mime_type.clone(),
            allowed: self.allowed.clone(),
        })
    }
}

fn essence(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

//! Upload records

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::UploadError;

/// A file part as announced by the client, before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    /// Form field the part arrived on
    pub field_name: String,
    /// Client-supplied filename (last segment only unless `preserve_path`)
    pub original_name: String,
    /// Declared or guessed MIME type
    pub mime_type: String,
}

/// A file stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub field_name: String,
    pub original_name: String,
    pub mime_type: String,
    /// Directory the file was written to
    pub destination: PathBuf,
    /// Generated storage name within `destination`
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Everything one multipart request carried.
///
/// Inserted into the request extensions by the upload middleware.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadedFiles {
    /// Stored files in arrival order
    pub files: Vec<UploadedFile>,
    /// Non-file form fields; a repeated name keeps every value in arrival order
    pub form: HashMap<String, Vec<String>>,
}

impl UploadedFiles {
    /// The first stored file, as produced by a single-field upload
    pub fn single(&self) -> Option<&UploadedFile> {
        self.files.first()
    }

    /// First value sent for a text field
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Files stored for one field
    pub fn field<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files.iter().filter(move |f| f.field_name == name)
    }

    /// Files grouped by field name
    pub fn by_field(&self) -> HashMap<&str, Vec<&UploadedFile>> {
        let mut grouped: HashMap<&str, Vec<&UploadedFile>> = HashMap::new();
        for file in &self.files {
            grouped.entry(file.field_name.as_str()).or_default().push(file);
        }
        grouped
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UploadedFiles
where
    S: Send + Sync,
{
    type Rejection = UploadError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .remove::<UploadedFiles>()
            .ok_or(UploadError::MissingUpload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(field: &str, name: &str) -> UploadedFile {
        UploadedFile {
            field_name: field.into(),
            original_name: name.into(),
            mime_type: "image/png".into(),
            destination: PathBuf::from("uploads"),
            filename: format!("id-{}.png", field),
            path: PathBuf::from("uploads").join(format!("id-{}.png", field)),
            size: 3,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_grouping() {
        let batch = UploadedFiles {
            files: vec![
                record("documents", "a.pdf"),
                record("avatar", "me.png"),
                record("documents", "b.pdf"),
            ],
            form: HashMap::new(),
        };

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.single().unwrap().original_name, "a.pdf");
        assert_eq!(batch.field("documents").count(), 2);
        assert_eq!(batch.field("missing").count(), 0);

        let grouped = batch.by_field();
        assert_eq!(grouped["avatar"].len(), 1);
        assert_eq!(grouped["documents"][1].original_name, "b.pdf");
    }

    #[test]
    fn test_form_values() {
        let mut batch = UploadedFiles::default();
        batch
            .form
            .insert("tag".into(), vec!["a".into(), "b".into()]);

        assert_eq!(batch.form_value("tag"), Some("a"));
        assert_eq!(batch.form_value("missing"), None);
    }

    #[test]
    fn test_empty_batch() {
        let batch = UploadedFiles::default();
        assert!(batch.is_empty());
        assert!(batch.single().is_none());
    }
}

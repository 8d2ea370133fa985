//! Declarative upload options

use std::path::PathBuf;

use fg_core::{
    UploadConfig, UploadFieldConfig, DEFAULT_FIELD_SIZE_LIMIT, DEFAULT_FILE_SIZE_LIMIT,
    DEFAULT_MAX_COUNT,
};
use serde::Deserialize;

use crate::naming::DEFAULT_FIELD_NAME;

/// How a multi-field upload applies filters and size limits across its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldPolicy {
    /// One allow-list built from every field's categories, applied to all
    /// fields, and the first field's size limit for the whole request
    #[default]
    Combined,
    /// Each field keeps its own allow-list and size limit
    Independent,
}

/// Options consumed by [`upload_single`](crate::upload_single) and
/// [`upload_multiple`](crate::upload_multiple)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadOptions {
    pub destination: PathBuf,
    /// Form field for single-field uploads
    #[serde(rename = "filename")]
    pub field_name: String,
    pub file_types: Vec<String>,
    pub custom_mime_types: Vec<String>,
    /// Bytes per file
    pub file_size_limit: u64,
    /// Bytes per non-file form field
    pub field_size_limit: u64,
    pub preserve_path: bool,
    /// Fields for multi-field uploads
    pub fields: Vec<FieldSpec>,
    pub field_policy: FieldPolicy,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("uploads"),
            field_name: DEFAULT_FIELD_NAME.to_string(),
            file_types: vec![],
            custom_mime_types: vec![],
            file_size_limit: DEFAULT_FILE_SIZE_LIMIT,
            field_size_limit: DEFAULT_FIELD_SIZE_LIMIT,
            preserve_path: false,
            fields: vec![],
            field_policy: FieldPolicy::default(),
        }
    }
}

impl UploadOptions {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn file_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn custom_mime_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.custom_mime_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = bytes;
        self
    }

    pub fn field_size_limit(mut self, bytes: u64) -> Self {
        self.field_size_limit = bytes;
        self
    }

    pub fn preserve_path(mut self, preserve: bool) -> Self {
        self.preserve_path = preserve;
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field_policy(mut self, policy: FieldPolicy) -> Self {
        self.field_policy = policy;
        self
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            destination: PathBuf::from(&config.destination),
            field_name: config.field_name.clone(),
            file_types: config.file_types.clone(),
            custom_mime_types: config.custom_mime_types.clone(),
            file_size_limit: config.max_file_size,
            field_size_limit: config.max_field_size,
            preserve_path: config.preserve_path,
            fields: config.batch_fields.iter().map(FieldSpec::from).collect(),
            field_policy: FieldPolicy::default(),
        }
    }
}

/// One named field of a multi-field upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(default = "default_max_count")]
    pub max_count: usize,
    /// Categories for this field; empty means `all`
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub file_size_limit: Option<u64>,
}

fn default_max_count() -> usize {
    DEFAULT_MAX_COUNT
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_count: DEFAULT_MAX_COUNT,
            file_types: vec![],
            file_size_limit: None,
        }
    }

    pub fn max_count(mut self, max: usize) -> Self {
        self.max_count = max;
        self
    }

    pub fn file_types<I, T>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.file_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn file_size_limit(mut self, bytes: u64) -> Self {
        self.file_size_limit = Some(bytes);
        self
    }
}

impl From<&UploadFieldConfig> for FieldSpec {
    fn from(config: &UploadFieldConfig) -> Self {
        Self {
            name: config.name.clone(),
            max_count: config.max_count,
            file_types: config.file_types.clone(),
            file_size_limit: None,
        }
    }
}

//! MIME category registry
//!
//! Fixed groups of MIME types addressable by category name. The table is
//! process-wide constant data.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "image/bmp",
];

pub const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/mpeg",
    "video/quicktime",
    "video/x-msvideo",
    "video/x-ms-wmv",
    "video/webm",
    "video/ogg",
];

pub const PDF_MIME_TYPES: &[&str] = &["application/pdf"];

/// Every registered MIME type: images, then videos, then pdfs
pub static ALL_MIME_TYPES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    IMAGE_MIME_TYPES
        .iter()
        .chain(VIDEO_MIME_TYPES)
        .chain(PDF_MIME_TYPES)
        .copied()
        .collect()
});

/// Category names accepted in `fileTypes`
pub const SUPPORTED_FILE_TYPES: &[&str] = &["images", "videos", "pdfs", "all"];

/// A named group of MIME types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Images,
    Videos,
    Pdfs,
    All,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Pdfs => "pdfs",
            Self::All => "all",
        }
    }

    /// Look up a category by its exact name
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "images" => Some(Self::Images),
            "videos" => Some(Self::Videos),
            "pdfs" => Some(Self::Pdfs),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn mime_types(&self) -> &'static [&'static str] {
        match self {
            Self::Images => IMAGE_MIME_TYPES,
            Self::Videos => VIDEO_MIME_TYPES,
            Self::Pdfs => PDF_MIME_TYPES,
            Self::All => ALL_MIME_TYPES.as_slice(),
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// MIME types registered under a category name, if the name is known
pub fn mime_types_for(name: &str) -> Option<&'static [&'static str]> {
    FileCategory::parse(name).map(|category| category.mime_types())
}

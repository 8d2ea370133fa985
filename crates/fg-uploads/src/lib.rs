//! FileGate upload layer
//!
//! Configures multipart upload handling for axum routes:
//! - MIME category registry and allow-list resolution
//! - Unique, collision-resistant stored filenames
//! - Single-field and multi-field upload middleware on top of `multer`
//! - Disk storage with pluggable destination and filename resolvers
//! - A fail-soft delete helper

pub mod delete;
pub mod error;
pub mod filter;
pub mod mime_types;
pub mod model;
pub mod naming;
pub mod options;
pub mod storage;
pub mod uploader;

pub use delete::{delete_file, remove_file, DeleteOutcome};
pub use error::{UploadError, UploadResult};
pub use filter::MimeFilter;
pub use mime_types::{FileCategory, SUPPORTED_FILE_TYPES};
pub use model::{IncomingFile, UploadedFile, UploadedFiles};
pub use naming::generate_filename;
pub use options::{FieldPolicy, FieldSpec, UploadOptions};
pub use storage::{
    DestinationResolver, DiskStorage, FilenameResolver, FixedDestination, UniqueFilename,
};
pub use uploader::{upload_middleware, upload_multiple, upload_single, Uploader};

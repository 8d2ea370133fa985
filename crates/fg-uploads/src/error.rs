//! Upload errors
//!
//! Every failure an upload request can hit, with its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid file type: {mime_type} on field '{field}'. Allowed types: {}", .allowed.join(", "))]
    InvalidFileType {
        field: String,
        mime_type: String,
        allowed: Vec<String>,
    },
    #[error("File too large on field '{field}' (max: {limit} bytes)")]
    FileTooLarge { field: String, limit: u64 },
    #[error("Form field '{field}' too large (max: {limit} bytes)")]
    FieldTooLarge { field: String, limit: u64 },
    #[error("Request body too large")]
    RequestTooLarge { limit: Option<u64> },
    #[error("Too many files on field '{field}' (max: {max})")]
    TooManyFiles { field: String, max: usize },
    #[error("Unexpected field: {0}")]
    UnexpectedField(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid multipart request: {0}")]
    Multipart(String),
    #[error("Invalid upload options: {0}")]
    InvalidOptions(String),
    #[error("Upload middleware not installed for this route")]
    MissingUpload,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UploadResult<T> = Result<T, UploadError>;

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::FileTooLarge { .. }
            | Self::FieldTooLarge { .. }
            | Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::TooManyFiles { .. }
            | Self::UnexpectedField(_)
            | Self::InvalidPath(_)
            | Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOptions(_) | Self::MissingUpload | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the client sent something the upload policy refuses
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidFileType { .. }
                | Self::FileTooLarge { .. }
                | Self::FieldTooLarge { .. }
                | Self::RequestTooLarge { .. }
                | Self::TooManyFiles { .. }
                | Self::UnexpectedField(_)
        )
    }

    fn identifier(&self) -> &'static str {
        match self {
            Self::InvalidFileType { .. } => "InvalidFileType",
            Self::FileTooLarge { .. } => "FileTooLarge",
            Self::FieldTooLarge { .. } => "FieldTooLarge",
            Self::RequestTooLarge { .. } => "RequestTooLarge",
            Self::TooManyFiles { .. } => "TooManyFiles",
            Self::UnexpectedField(_) => "UnexpectedField",
            Self::InvalidPath(_) => "InvalidPath",
            Self::Multipart(_) => "InvalidRequestBody",
            Self::InvalidOptions(_) | Self::MissingUpload | Self::Io(_) => "InternalError",
        }
    }
}

impl From<multer::Error> for UploadError {
    fn from(error: multer::Error) -> Self {
        match error {
            multer::Error::FieldSizeExceeded { limit, field_name } => Self::FileTooLarge {
                field: field_name.unwrap_or_default(),
                limit,
            },
            multer::Error::StreamSizeExceeded { limit } => Self::RequestTooLarge {
                limit: Some(limit),
            },
            // A body cap enforced below the parser surfaces as a read failure
            multer::Error::StreamReadFailed(source) if exceeds_length_limit(source.as_ref()) => {
                Self::RequestTooLarge { limit: None }
            }
            other => Self::Multipart(other.to_string()),
        }
    }
}

fn exceeds_length_limit(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if error.is::<LengthLimitError>() {
            return true;
        }
        current = error.source();
    }
    false
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "_type")]
    type_name: &'static str,
    #[serde(rename = "errorIdentifier")]
    error_identifier: String,
    message: String,
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Keep filesystem details out of client responses
            Self::Io(_) => "Failed to store uploaded file".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            type_name: "Error",
            error_identifier: format!("urn:filegate:errors:{}", self.identifier()),
            message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_file_type_message() {
        let err = UploadError::InvalidFileType {
            field: "avatar".into(),
            mime_type: "application/pdf".into(),
            allowed: vec!["image/png".into(), "image/gif".into()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid file type: application/pdf on field 'avatar'. Allowed types: image/png, image/gif"
        );
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(err.is_validation());
    }

    #[test]
    fn test_field_size_maps_to_too_large() {
        let err: UploadError = multer::Error::FieldSizeExceeded {
            limit: 1024,
            field_name: Some("file".into()),
        }
        .into();
        assert!(matches!(err, UploadError::FileTooLarge { ref field, limit: 1024 } if field == "file"));
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_length_limit_maps_to_too_large() {
        use http_body_util::{BodyExt, Full, Limited};

        let cause = Limited::new(Full::new(bytes::Bytes::from_static(b"0123456789")), 4)
            .collect()
            .await
            .unwrap_err();
        let err: UploadError =
            multer::Error::StreamReadFailed(Box::new(axum::Error::new(cause))).into();

        assert!(matches!(err, UploadError::RequestTooLarge { limit: None }));
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_other_read_failures_stay_bad_request() {
        let cause = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: UploadError = multer::Error::StreamReadFailed(Box::new(cause)).into();

        assert!(matches!(err, UploadError::Multipart(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_stream_size_maps_to_request_too_large() {
        let err: UploadError = multer::Error::StreamSizeExceeded { limit: 64 }.into();
        assert!(matches!(err, UploadError::RequestTooLarge { limit: Some(64) }));
    }

    #[test]
    fn test_io_is_not_validation() {
        let err = UploadError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(!err.is_validation());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

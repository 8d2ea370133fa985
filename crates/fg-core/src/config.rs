//! Configuration types and loading
//!
//! Settings come from environment variables (optionally seeded from a `.env`
//! file by the binary) layered over built-in defaults.

use serde::{Deserialize, Serialize};

/// Default upload size limit: 50 MiB
pub const DEFAULT_FILE_SIZE_LIMIT: u64 = 50 * 1024 * 1024;

/// Default size limit for one non-file form field: 1 MiB
pub const DEFAULT_FIELD_SIZE_LIMIT: u64 = 1024 * 1024;

/// Default maximum number of files per field in a multi-field upload
pub const DEFAULT_MAX_COUNT: usize = 10;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Upload defaults
    pub uploads: UploadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    /// Ceiling for a whole request body, checked before multipart parsing
    pub max_body_size_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory uploaded files are written to
    pub destination: String,
    /// Form field carrying the file for single-field uploads
    pub field_name: String,
    /// Category names (`images`, `videos`, `pdfs`, `all`)
    pub file_types: Vec<String>,
    /// Explicit MIME types, overriding `file_types` when non-empty
    pub custom_mime_types: Vec<String>,
    /// Maximum size of one file in bytes
    pub max_file_size: u64,
    /// Maximum size of one text field in bytes
    pub max_field_size: u64,
    /// Keep the full client-supplied path as the original name
    pub preserve_path: bool,
    /// Fields accepted by the multi-field endpoint
    pub batch_fields: Vec<UploadFieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UploadFieldConfig {
    pub name: String,
    pub max_count: usize,
    pub file_types: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_seconds: 60,
                max_body_size_bytes: 256 * 1024 * 1024, // 256MB
            },
            uploads: UploadConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            destination: "uploads".to_string(),
            field_name: "file".to_string(),
            file_types: vec![],
            custom_mime_types: vec![],
            max_file_size: DEFAULT_FILE_SIZE_LIMIT,
            max_field_size: DEFAULT_FIELD_SIZE_LIMIT,
            preserve_path: false,
            batch_fields: vec![],
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset keys keep their defaults; set but malformed keys are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Server
        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.server.port = parse_number("PORT", &port)?;
        }
        if let Some(size) = lookup("FILEGATE_MAX_BODY_SIZE") {
            config.server.max_body_size_bytes = parse_number("FILEGATE_MAX_BODY_SIZE", &size)?;
        }
        if let Some(secs) = lookup("FILEGATE_REQUEST_TIMEOUT") {
            config.server.request_timeout_seconds =
                parse_positive("FILEGATE_REQUEST_TIMEOUT", &secs)?;
        }

        // Uploads
        if let Some(dir) = lookup("FILEGATE_UPLOAD_DIR") {
            config.uploads.destination = dir;
        }
        if let Some(field) = lookup("FILEGATE_FIELD_NAME") {
            config.uploads.field_name = field;
        }
        if let Some(types) = lookup("FILEGATE_FILE_TYPES") {
            config.uploads.file_types = split_list(&types, ',');
        }
        if let Some(types) = lookup("FILEGATE_CUSTOM_MIME_TYPES") {
            config.uploads.custom_mime_types = split_list(&types, ',');
        }
        if let Some(size) = lookup("FILEGATE_MAX_FILE_SIZE") {
            config.uploads.max_file_size = parse_positive("FILEGATE_MAX_FILE_SIZE", &size)?;
        }
        if let Some(size) = lookup("FILEGATE_MAX_FIELD_SIZE") {
            config.uploads.max_field_size = parse_positive("FILEGATE_MAX_FIELD_SIZE", &size)?;
        }
        if let Some(v) = lookup("FILEGATE_PRESERVE_PATH") {
            config.uploads.preserve_path = v == "true" || v == "1" || v == "yes";
        }
        if let Some(fields) = lookup("FILEGATE_BATCH_FIELDS") {
            config.uploads.batch_fields = parse_batch_fields(&fields)?;
        }

        Ok(config)
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_positive(key: &str, value: &str) -> Result<u64, ConfigError> {
    match parse_number(key, value)? {
        0 => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        n => Ok(n),
    }
}

fn split_list(value: &str, sep: char) -> Vec<String> {
    value
        .split(sep)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `name:maxCount:type|type,...`; `maxCount` and types are optional.
fn parse_batch_fields(value: &str) -> Result<Vec<UploadFieldConfig>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidValue {
        key: "FILEGATE_BATCH_FIELDS".to_string(),
        message,
    };

    split_list(value, ',')
        .into_iter()
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let name = parts.next().unwrap_or_default().trim().to_string();
            if name.is_empty() {
                return Err(invalid(format!("missing field name in '{}'", entry)));
            }
            let max_count = match parts.next().map(str::trim).filter(|s| !s.is_empty()) {
                Some(count) => count
                    .parse()
                    .map_err(|_| invalid(format!("invalid max count '{}' for {}", count, name)))?,
                None => DEFAULT_MAX_COUNT,
            };
            let file_types = parts
                .next()
                .map(|types| split_list(types, '|'))
                .unwrap_or_default();

            Ok(UploadFieldConfig {
                name,
                max_count,
                file_types,
            })
        })
        .collect()
}

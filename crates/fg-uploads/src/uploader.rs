//! Upload middleware
//!
//! Builds a configured [`Uploader`] from [`UploadOptions`] and drives the
//! `multer` parser for each request: size limits are handed to `multer`,
//! every file part is filtered, named, and streamed to disk, and the results
//! land in the request extensions as [`UploadedFiles`].
//!
//! ```rust,ignore
//! let uploader = upload_single(UploadOptions::new("uploads").file_types(["images"]))?;
//!
//! let app = Router::new()
//!     .route("/avatar", post(save_avatar))
//!     .route_layer(middleware::from_fn_with_state(uploader, upload_middleware));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use multer::{Constraints, Field, Multipart, SizeLimit};
use tracing::{debug, warn};

use crate::delete::remove_file;
use crate::error::{UploadError, UploadResult};
use crate::filter::MimeFilter;
use crate::model::{IncomingFile, UploadedFiles};
use crate::naming::base_name;
use crate::options::{FieldPolicy, UploadOptions};
use crate::storage::DiskStorage;

/// Resolved policy for one accepted field
#[derive(Debug, Clone)]
struct FieldRule {
    name: String,
    max_count: usize,
    filter: MimeFilter,
    size_limit: u64,
}

#[derive(Debug, Clone)]
struct UploadPlan {
    storage: DiskStorage,
    rules: Vec<FieldRule>,
    /// Limit for parts without a rule of their own
    default_size_limit: u64,
    /// Limit for each non-file form field
    field_size_limit: u64,
    /// Limit for the whole multipart stream
    request_limit: Option<u64>,
    preserve_path: bool,
}

/// A configured upload handler, shared across requests
#[derive(Debug, Clone)]
pub struct Uploader {
    plan: Arc<UploadPlan>,
}

/// Accept at most one file on `options.field_name`
pub fn upload_single(options: UploadOptions) -> UploadResult<Uploader> {
    validate_size_limit("fileSizeLimit", options.file_size_limit)?;
    validate_size_limit("fieldSizeLimit", options.field_size_limit)?;
    validate_field_name(&options.field_name)?;

    let rule = FieldRule {
        name: options.field_name.clone(),
        max_count: 1,
        filter: MimeFilter::resolve(&options.file_types, &options.custom_mime_types),
        size_limit: options.file_size_limit,
    };

    debug!(
        field = %rule.name,
        destination = ?options.destination,
        allowed = rule.filter.allowed().len(),
        size_limit = rule.size_limit,
        "Single-field uploader configured"
    );

    Ok(Uploader::from_plan(UploadPlan {
        storage: DiskStorage::new(options.destination),
        rules: vec![rule],
        default_size_limit: options.file_size_limit,
        field_size_limit: options.field_size_limit,
        request_limit: None,
        preserve_path: options.preserve_path,
    }))
}

/// Accept files on each of `options.fields`, up to the field's `max_count`.
///
/// Under [`FieldPolicy::Combined`] every field shares one allow-list built
/// from all fields' categories, and the first field's size limit (falling
/// back to `options.file_size_limit`) applies to the whole request.
pub fn upload_multiple(options: UploadOptions) -> UploadResult<Uploader> {
    validate_size_limit("fileSizeLimit", options.file_size_limit)?;
    validate_size_limit("fieldSizeLimit", options.field_size_limit)?;

    let mut seen = HashSet::new();
    for field in &options.fields {
        validate_field_name(&field.name)?;
        if field.max_count == 0 {
            return Err(UploadError::InvalidOptions(format!(
                "maxCount for field '{}' must be at least 1",
                field.name
            )));
        }
        if let Some(limit) = field.file_size_limit {
            validate_size_limit(&field.name, limit)?;
        }
        if !seen.insert(field.name.as_str()) {
            return Err(UploadError::InvalidOptions(format!(
                "duplicate field name '{}'",
                field.name
            )));
        }
    }

    let (rules, default_size_limit) = match options.field_policy {
        FieldPolicy::Combined => {
            let categories: Vec<&str> = options
                .fields
                .iter()
                .flat_map(|field| {
                    if field.file_types.is_empty() {
                        vec!["all"]
                    } else {
                        field.file_types.iter().map(String::as_str).collect()
                    }
                })
                .collect();
            let filter = MimeFilter::resolve(&categories, &options.custom_mime_types);
            let size_limit = options
                .fields
                .first()
                .and_then(|field| field.file_size_limit)
                .unwrap_or(options.file_size_limit);

            let rules = options
                .fields
                .iter()
                .map(|field| FieldRule {
                    name: field.name.clone(),
                    max_count: field.max_count,
                    filter: filter.clone(),
                    size_limit,
                })
                .collect();
            (rules, size_limit)
        }
        FieldPolicy::Independent => {
            let rules = options
                .fields
                .iter()
                .map(|field| FieldRule {
                    name: field.name.clone(),
                    max_count: field.max_count,
                    filter: MimeFilter::resolve(&field.file_types, &options.custom_mime_types),
                    size_limit: field.file_size_limit.unwrap_or(options.file_size_limit),
                })
                .collect();
            (rules, options.file_size_limit)
        }
    };

    debug!(
        fields = options.fields.len(),
        policy = ?options.field_policy,
        destination = ?options.destination,
        "Multi-field uploader configured"
    );

    Ok(Uploader::from_plan(UploadPlan {
        storage: DiskStorage::new(options.destination),
        rules,
        default_size_limit,
        field_size_limit: options.field_size_limit,
        request_limit: None,
        preserve_path: options.preserve_path,
    }))
}

fn validate_field_name(name: &str) -> UploadResult<()> {
    if name.trim().is_empty() {
        return Err(UploadError::InvalidOptions(
            "field name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_size_limit(owner: &str, limit: u64) -> UploadResult<()> {
    if limit == 0 {
        return Err(UploadError::InvalidOptions(format!(
            "size limit for '{}' must be greater than zero",
            owner
        )));
    }
    Ok(())
}

impl Uploader {
    fn from_plan(plan: UploadPlan) -> Self {
        Self {
            plan: Arc::new(plan),
        }
    }

    /// Replace the storage policy (destination and naming)
    pub fn with_storage(mut self, storage: DiskStorage) -> Self {
        Arc::make_mut(&mut self.plan).storage = storage;
        self
    }

    /// Cap the whole multipart stream at `bytes`
    pub fn with_request_limit(mut self, bytes: u64) -> Self {
        Arc::make_mut(&mut self.plan).request_limit = Some(bytes);
        self
    }

    /// Accepted field names with their maximum file counts
    pub fn fields(&self) -> Vec<(&str, usize)> {
        self.plan
            .rules
            .iter()
            .map(|rule| (rule.name.as_str(), rule.max_count))
            .collect()
    }

    /// Allow-list applied to a field
    pub fn filter_for(&self, field: &str) -> Option<&MimeFilter> {
        self.rule(field).map(|rule| &rule.filter)
    }

    /// Size limit applied to a field
    pub fn size_limit_for(&self, field: &str) -> Option<u64> {
        self.rule(field).map(|rule| rule.size_limit)
    }

    fn rule(&self, field: &str) -> Option<&FieldRule> {
        self.plan.rules.iter().find(|rule| rule.name == field)
    }

    fn constraints(&self) -> Constraints {
        let base = match self.plan.request_limit {
            Some(bytes) => SizeLimit::new().whole_stream(bytes),
            None => SizeLimit::new(),
        };
        let limits = self
            .plan
            .rules
            .iter()
            .filter(|rule| rule.size_limit != self.plan.default_size_limit)
            .fold(
                base.per_field(self.plan.default_size_limit),
                |limits, rule| limits.for_field(rule.name.clone(), rule.size_limit),
            );
        Constraints::new().size_limit(limits)
    }

    /// Parse a multipart body and store its files.
    ///
    /// On failure every file already stored for this request is removed
    /// before the error is returned.
    pub async fn accept(&self, headers: &HeaderMap, body: Body) -> UploadResult<UploadedFiles> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| UploadError::Multipart("missing Content-Type header".to_string()))?;
        let boundary = multer::parse_boundary(content_type)?;
        let mut multipart =
            Multipart::with_constraints(body.into_data_stream(), boundary, self.constraints());

        let mut batch = UploadedFiles::default();
        match self.collect(&mut multipart, &mut batch).await {
            Ok(()) => {
                debug!(files = batch.len(), fields = batch.form.len(), "Upload accepted");
                Ok(batch)
            }
            Err(err) => {
                warn!(error = %err, stored = batch.len(), "Upload rejected");
                for file in &batch.files {
                    remove_file(&file.path).await;
                }
                Err(err)
            }
        }
    }

    async fn collect(
        &self,
        multipart: &mut Multipart<'static>,
        batch: &mut UploadedFiles,
    ) -> UploadResult<()> {
        let mut counts: HashMap<String, usize> = HashMap::new();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            let file_name = field.file_name().map(str::to_string);

            let client_name = match file_name {
                None => {
                    let value = read_text(&mut field, &name, self.plan.field_size_limit).await?;
                    batch.form.entry(name).or_default().push(value);
                    continue;
                }
                // Empty file inputs arrive with a blank filename
                Some(file_name) if file_name.is_empty() => continue,
                Some(file_name) => file_name,
            };

            let rule = self
                .rule(&name)
                .ok_or_else(|| UploadError::UnexpectedField(name.clone()))?;

            let count = counts.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count > rule.max_count {
                return Err(UploadError::TooManyFiles {
                    field: name,
                    max: rule.max_count,
                });
            }

            let original_name = if self.plan.preserve_path {
                client_name
            } else {
                base_name(&client_name).to_string()
            };
            let mime_type = match field.content_type() {
                Some(mime) => mime.to_string(),
                None => mime_guess::from_path(&original_name)
                    .first_or_octet_stream()
                    .to_string(),
            };

            let incoming = IncomingFile {
                field_name: name,
                original_name,
                mime_type,
            };
            rule.filter.check(&incoming)?;

            let stored = self.plan.storage.store(&incoming, field).await?;
            batch.files.push(stored);
        }

        Ok(())
    }
}

/// Buffer a text part, refusing it once it grows past `limit` bytes
async fn read_text(field: &mut Field<'static>, name: &str, limit: u64) -> UploadResult<String> {
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(UploadError::FieldTooLarge {
                field: name.to_string(),
                limit,
            });
        }
        buf.extend_from_slice(&chunk);
    }

    String::from_utf8(buf)
        .map_err(|_| UploadError::Multipart(format!("field '{}' is not valid UTF-8", name)))
}

/// Whether a request carries a multipart body
fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|mime| mime.type_() == mime::MULTIPART)
        .unwrap_or(false)
}

/// Request middleware for `axum::middleware::from_fn_with_state`.
///
/// Multipart requests are consumed and replaced by their [`UploadedFiles`]
/// extension; upload errors short-circuit into an error response. Other
/// requests pass through with an empty batch.
pub async fn upload_middleware(
    State(uploader): State<Uploader>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if !is_multipart(&parts.headers) {
        parts.extensions.insert(UploadedFiles::default());
        return next.run(Request::from_parts(parts, body)).await;
    }

    match uploader.accept(&parts.headers, body).await {
        Ok(files) => {
            parts.extensions.insert(files);
            next.run(Request::from_parts(parts, Body::empty())).await
        }
        Err(err) => err.into_response(),
    }
}

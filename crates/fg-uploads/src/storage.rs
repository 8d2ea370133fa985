//! Disk storage policy
//!
//! A storage policy is a destination resolver paired with a filename resolver,
//! both consulted once per incoming file before its bytes are written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use crate::error::{UploadError, UploadResult};
use crate::model::{IncomingFile, UploadedFile};
use crate::naming::generate_filename;

/// Picks the directory an incoming file is written to
pub trait DestinationResolver: Send + Sync {
    fn destination(&self, file: &IncomingFile) -> UploadResult<PathBuf>;
}

/// Picks the name an incoming file is stored under
pub trait FilenameResolver: Send + Sync {
    fn filename(&self, file: &IncomingFile) -> UploadResult<String>;
}

impl<F> DestinationResolver for F
where
    F: Fn(&IncomingFile) -> UploadResult<PathBuf> + Send + Sync,
{
    fn destination(&self, file: &IncomingFile) -> UploadResult<PathBuf> {
        self(file)
    }
}

impl<F> FilenameResolver for F
where
    F: Fn(&IncomingFile) -> UploadResult<String> + Send + Sync,
{
    fn filename(&self, file: &IncomingFile) -> UploadResult<String> {
        self(file)
    }
}

/// Every file goes to the same directory
#[derive(Debug, Clone)]
pub struct FixedDestination(pub PathBuf);

impl DestinationResolver for FixedDestination {
    fn destination(&self, _file: &IncomingFile) -> UploadResult<PathBuf> {
        Ok(self.0.clone())
    }
}

/// `<uuid>-<field><ext>` names
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueFilename;

impl FilenameResolver for UniqueFilename {
    fn filename(&self, file: &IncomingFile) -> UploadResult<String> {
        Ok(generate_filename(&file.original_name, Some(&file.field_name)))
    }
}

/// Disk-backed storage policy
#[derive(Clone)]
pub struct DiskStorage {
    destination: Arc<dyn DestinationResolver>,
    filename: Arc<dyn FilenameResolver>,
}

impl std::fmt::Debug for DiskStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStorage").finish_non_exhaustive()
    }
}

impl DiskStorage {
    /// Store under `destination` with generated unique names
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: Arc::new(FixedDestination(destination.into())),
            filename: Arc::new(UniqueFilename),
        }
    }

    pub fn with_destination(mut self, resolver: impl DestinationResolver + 'static) -> Self {
        self.destination = Arc::new(resolver);
        self
    }

    pub fn with_filename(mut self, resolver: impl FilenameResolver + 'static) -> Self {
        self.filename = Arc::new(resolver);
        self
    }

    /// Stream one file part to disk.
    ///
    /// The destination directory is created if missing. A failed write removes
    /// whatever was already written.
    #[instrument(skip(self, file, chunks), fields(field = %file.field_name, original = %file.original_name))]
    pub async fn store<S, E>(&self, file: &IncomingFile, chunks: S) -> UploadResult<UploadedFile>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<UploadError>,
    {
        let destination = self.destination.destination(file)?;
        let filename = self.filename.filename(file)?;
        let path = resolve_path(&destination, &filename)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut out = fs::File::create(&path).await?;
        let size = match write_chunks(&mut out, chunks).await {
            Ok(size) => size,
            Err(err) => {
                drop(out);
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(path = ?path, error = %cleanup, "Failed to remove partial upload");
                }
                return Err(err);
            }
        };

        debug!(path = ?path, size = size, "File stored");

        Ok(UploadedFile {
            field_name: file.field_name.clone(),
            original_name: file.original_name.clone(),
            mime_type: file.mime_type.clone(),
            destination,
            filename,
            path,
            size,
            uploaded_at: chrono::Utc::now(),
        })
    }
}

async fn write_chunks<S, E>(out: &mut fs::File, chunks: S) -> UploadResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<UploadError>,
{
    futures::pin_mut!(chunks);

    let mut size = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(Into::into)?;
        out.write_all(&chunk).await?;
        size += chunk.len() as u64;
    }
    out.flush().await?;
    Ok(size)
}

/// Join a generated name onto its directory, refusing anything that escapes it
fn resolve_path(destination: &Path, filename: &str) -> UploadResult<PathBuf> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.starts_with('/')
        || filename.starts_with('\\')
    {
        return Err(UploadError::InvalidPath(filename.to_string()));
    }

    Ok(destination.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn incoming(field: &str, name: &str) -> IncomingFile {
        IncomingFile {
            field_name: field.into(),
            original_name: name.into(),
            mime_type: "image/png".into(),
        }
    }

    fn chunks(parts: &[&'static [u8]]) -> impl Stream<Item = Result<Bytes, UploadError>> {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok::<_, UploadError>(Bytes::from_static(*p)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_store_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path().join("nested"));

        let stored = storage
            .store(&incoming("avatar", "me.png"), chunks(&[b"abc", b"def"]))
            .await
            .unwrap();

        assert_eq!(stored.size, 6);
        assert_eq!(stored.destination, dir.path().join("nested"));
        assert!(stored.filename.ends_with("-avatar.png"));
        assert_eq!(stored.path, stored.destination.join(&stored.filename));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"abcdef");
    }

    #[tokio::test]
    async fn test_failed_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path()).with_filename(|_: &IncomingFile| {
            Ok::<_, UploadError>("fixed.png".to_string())
        });

        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(UploadError::FileTooLarge {
                field: "file".into(),
                limit: 7,
            }),
        ]);

        let err = storage
            .store(&incoming("file", "big.png"), body)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::FileTooLarge { .. }));
        assert!(!dir.path().join("fixed.png").exists());
    }

    #[tokio::test]
    async fn test_custom_resolvers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let storage = DiskStorage::new("unused")
            .with_destination(move |file: &IncomingFile| {
                Ok::<_, UploadError>(root.join(&file.field_name))
            })
            .with_filename(|file: &IncomingFile| Ok::<_, UploadError>(file.original_name.clone()));

        let stored = storage
            .store(&incoming("docs", "a.png"), chunks(&[b"x"]))
            .await
            .unwrap();

        assert_eq!(stored.path, dir.path().join("docs").join("a.png"));
        assert!(stored.path.exists());
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = DiskStorage::new(dir.path())
            .with_filename(|_: &IncomingFile| Ok::<_, UploadError>("../escape.png".to_string()));

        let result = storage.store(&incoming("file", "x.png"), chunks(&[b"x"])).await;
        assert!(matches!(result, Err(UploadError::InvalidPath(_))));
    }

    #[test]
    fn test_resolve_path() {
        let root = Path::new("uploads");
        assert_eq!(
            resolve_path(root, "id-file.png").unwrap(),
            PathBuf::from("uploads/id-file.png")
        );
        assert!(resolve_path(root, "/etc/passwd").is_err());
        assert!(resolve_path(root, "").is_err());
    }
}

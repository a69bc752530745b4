//! Ephemeral on-disk storage for uploaded images.
//!
//! Files live for one request. Each upload gets a UUID-based name so
//! concurrent requests never collide, and the size ceiling is enforced while
//! streaming so an oversized body never lands on disk in full.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use photo_advisor_core::{
    config::UploadConfig,
    traits::ImageStore,
    types::{ImageField, IncomingUpload, UploadedImage},
    Error, Result,
};

/// Filesystem-backed [`ImageStore`].
#[derive(Debug, Clone)]
pub struct EphemeralFileStore {
    dir: PathBuf,
    max_file_size: u64,
}

impl EphemeralFileStore {
    /// Create a store rooted at `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            dir: dir.into(),
            max_file_size,
        }
    }

    /// Create a store from the upload section of the app config.
    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.dir.clone(), config.max_file_size_bytes)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Remove files older than `max_age`. Returns how many were removed.
    pub async fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(Error::storage(format!(
                    "Failed to read upload directory {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::storage(format!("Failed to scan upload directory: {}", e)))?
        {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stale upload")
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "Swept stale uploads");
        }
        Ok(removed)
    }

    /// Run [`Self::sweep_stale`] every `interval` until the task is aborted.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        max_age: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // Skip first immediate tick
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_stale(max_age).await {
                    tracing::warn!(error = %e, "Upload sweep failed");
                }
            }
        })
    }

    fn check_content_type(content_type: Option<&str>) -> Result<String> {
        let declared = content_type.map(str::trim).unwrap_or_default();
        let essence = declared
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.strip_prefix("image/") {
            Some(subtype) if !subtype.is_empty() => Ok(essence),
            _ => Err(Error::unsupported_media_type(if declared.is_empty() {
                "missing content type, expected image/*".to_string()
            } else {
                format!("{}, expected image/*", declared)
            })),
        }
    }

    fn extension_for(mime_type: &str, file_name: Option<&str>) -> String {
        let from_name = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase);

        from_name.unwrap_or_else(|| {
            match mime_type {
                "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
                "image/png" => "png",
                "image/gif" => "gif",
                "image/webp" => "webp",
                "image/heic" => "heic",
                "image/heif" => "heif",
                "image/bmp" => "bmp",
                _ => "img",
            }
            .to_string()
        })
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::storage(format!(
                "Failed to create upload directory {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    async fn write_body(&self, path: &Path, mut body: BoxStream<'_, Result<Bytes>>) -> Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::storage(format!("Failed to create {}: {}", path.display(), e)))?;

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            // Check size limit incrementally to fail fast
            if written > self.max_file_size {
                return Err(Error::FileTooLarge {
                    size: written,
                    limit: self.max_file_size,
                });
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::storage(format!("Failed to write {}: {}", path.display(), e)))?;
        }

        file.flush()
            .await
            .map_err(|e| Error::storage(format!("Failed to flush {}: {}", path.display(), e)))?;
        Ok(written)
    }
}

/// Removes a file that is still being written unless it is kept.
///
/// Covers error returns and a store future dropped mid-write.
struct PartialFile<'a> {
    path: &'a Path,
    keep: bool,
}

impl<'a> PartialFile<'a> {
    fn new(path: &'a Path) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to discard partial upload");
            }
        }
    }
}

#[async_trait]
impl ImageStore for EphemeralFileStore {
    async fn store(&self, field: ImageField, upload: IncomingUpload<'_>) -> Result<UploadedImage> {
        let mime_type = Self::check_content_type(upload.content_type.as_deref())?;
        self.ensure_dir().await?;

        let id = Uuid::new_v4();
        let extension = Self::extension_for(&mime_type, upload.file_name.as_deref());
        let path = self.dir.join(format!("{}-{}.{}", field, id, extension));

        let IncomingUpload { file_name, body, .. } = upload;
        let partial = PartialFile::new(&path);
        let size_bytes = match self.write_body(&path, body).await {
            Ok(0) => return Err(Error::invalid_request(format!("{} upload is empty", field))),
            Ok(size) => size,
            Err(e) => {
                tracing::warn!(field = %field, error = %e, "Rejected upload");
                return Err(e);
            }
        };
        partial.keep();

        tracing::debug!(
            field = %field,
            id = %id,
            size = size_bytes,
            mime_type = %mime_type,
            "Stored ephemeral upload"
        );

        Ok(UploadedImage {
            id,
            field,
            path,
            mime_type,
            size_bytes,
            file_name,
        })
    }

    async fn release(&self, image: &UploadedImage) -> Result<()> {
        if !image.path.starts_with(&self.dir) {
            return Err(Error::storage(format!(
                "Refusing to release {} outside {}",
                image.path.display(),
                self.dir.display()
            )));
        }

        match tokio::fs::remove_file(&image.path).await {
            Ok(()) => {
                tracing::debug!(field = %image.field, id = %image.id, "Released ephemeral upload");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(format!(
                "Failed to remove {}: {}",
                image.path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn png(data: &'static [u8]) -> IncomingUpload<'static> {
        IncomingUpload::from_bytes(
            Some("leaf.png".into()),
            Some("image/png".into()),
            Bytes::from_static(data),
        )
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_store_and_release() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path().join("uploads"), 1024);

        let image = store.store(ImageField::Problem, png(b"fake-png")).await.unwrap();
        assert_eq!(image.size_bytes, 8);
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.file_name.as_deref(), Some("leaf.png"));
        assert!(image.path.starts_with(store.dir()));
        assert_eq!(std::fs::read(&image.path).unwrap(), b"fake-png");

        store.release(&image).await.unwrap();
        assert!(!image.path.exists());

        // Second release is a no-op
        store.release(&image).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_uploads_get_distinct_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        let (a, b) = tokio::join!(
            store.store(ImageField::Problem, png(b"one")),
            store.store(ImageField::Problem, png(b"two")),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path, b.path);
        assert_eq!(file_count(tmp.path()), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_image_before_writing() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("uploads");
        let store = EphemeralFileStore::new(&dir, 1024);

        let upload = IncomingUpload::from_bytes(
            Some("notes.txt".into()),
            Some("text/plain".into()),
            Bytes::from_static(b"hello"),
        );
        let err = store.store(ImageField::Problem, upload).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
        assert!(!dir.exists());

        let upload = IncomingUpload::from_bytes(None, None, Bytes::from_static(b"hello"));
        let err = store.store(ImageField::Selfie, upload).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        let upload = IncomingUpload::from_bytes(
            None,
            Some("Image/JPEG; charset=binary".into()),
            Bytes::from_static(b"jpg"),
        );
        let image = store.store(ImageField::Selfie, upload).await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
        assert_eq!(image.path.extension().unwrap(), "jpg");
    }

    #[tokio::test]
    async fn test_oversized_upload_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 4);

        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ];
        let upload = IncomingUpload::new(
            None,
            Some("image/png".into()),
            stream::iter(chunks).boxed(),
        );
        let err = store.store(ImageField::Problem, upload).await.unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { size: 6, limit: 4 }));
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_exact_ceiling_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 4);

        let image = store.store(ImageField::Problem, png(b"abcd")).await.unwrap();
        assert_eq!(image.size_bytes, 4);
    }

    #[tokio::test]
    async fn test_stream_error_discards_partial_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Err(Error::invalid_request("connection reset")),
        ];
        let upload = IncomingUpload::new(
            None,
            Some("image/png".into()),
            stream::iter(chunks).boxed(),
        );
        assert!(store.store(ImageField::Problem, upload).await.is_err());
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_cancelled_write_leaves_nothing_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        let first: Vec<Result<Bytes>> = vec![Ok(Bytes::from_static(b"abc"))];
        let upload = IncomingUpload::new(
            None,
            Some("image/png".into()),
            stream::iter(first).chain(stream::pending()).boxed(),
        );
        let write = store.store(ImageField::Problem, upload);
        assert!(tokio::time::timeout(Duration::from_millis(50), write)
            .await
            .is_err());
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        let err = store.store(ImageField::Selfie, png(b"")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_release_outside_dir_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let other = tempfile::NamedTempFile::new().unwrap();
        let store = EphemeralFileStore::new(tmp.path().join("uploads"), 1024);

        let image = UploadedImage {
            id: Uuid::new_v4(),
            field: ImageField::Problem,
            path: other.path().to_path_buf(),
            mime_type: "image/png".into(),
            size_bytes: 0,
            file_name: None,
        };
        assert!(matches!(store.release(&image).await, Err(Error::Storage(_))));
        assert!(other.path().exists());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_stale_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path(), 1024);

        store.store(ImageField::Problem, png(b"old")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.sweep_stale(Duration::from_secs(3600)).await.unwrap(), 0);
        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(file_count(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_sweep_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EphemeralFileStore::new(tmp.path().join("never-created"), 1024);
        assert_eq!(store.sweep_stale(Duration::ZERO).await.unwrap(), 0);
    }

    #[test]
    fn test_extension_selection() {
        assert_eq!(EphemeralFileStore::extension_for("image/png", Some("a.JPG")), "jpg");
        assert_eq!(EphemeralFileStore::extension_for("image/webp", None), "webp");
        assert_eq!(EphemeralFileStore::extension_for("image/x-raw", Some("../../etc")), "img");
    }
}

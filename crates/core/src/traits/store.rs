//! Ephemeral store traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ImageField, IncomingUpload, UploadedImage};

/// Transient persistence for uploaded images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist an upload.
    ///
    /// Fails with a validation error when the content type is not `image/*` or
    /// the body exceeds the size ceiling. Nothing is left on disk on failure.
    async fn store(&self, field: ImageField, upload: IncomingUpload<'_>) -> Result<UploadedImage>;

    /// Delete the backing file. Succeeds when the file is already gone.
    async fn release(&self, image: &UploadedImage) -> Result<()>;
}

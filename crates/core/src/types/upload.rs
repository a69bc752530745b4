use std::path::PathBuf;

use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

// =============================================================================
// Upload Types
// =============================================================================

/// The two image fields a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageField {
    /// The photo of the problem. The only image sent to inference.
    Problem,
    /// Confirmatory selfie. Used for the audit channel only.
    Selfie,
}

impl ImageField {
    /// Multipart form field name.
    pub fn form_name(&self) -> &'static str {
        match self {
            ImageField::Problem => "image",
            ImageField::Selfie => "selfie",
        }
    }

    /// Look up a field by its multipart name.
    pub fn from_form_name(name: &str) -> Option<Self> {
        match name {
            "image" => Some(ImageField::Problem),
            "selfie" => Some(ImageField::Selfie),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.form_name())
    }
}

/// Handle to an image persisted in the ephemeral store.
///
/// Cloning the handle does not copy the file. The backing file is removed by
/// `ImageStore::release`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedImage {
    /// Unique ID, also part of the file name.
    pub id: Uuid,
    /// Which form field this came from.
    pub field: ImageField,
    /// Temporary location on disk.
    pub path: PathBuf,
    /// Declared MIME type, always `image/*`.
    pub mime_type: String,
    /// Bytes written.
    pub size_bytes: u64,
    /// Client-supplied file name, if any.
    pub file_name: Option<String>,
}

impl UploadedImage {
    /// Name to present to external services.
    pub fn display_name(&self) -> String {
        self.file_name
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.field, self.id))
    }
}

/// An upload as received from the client, before it touches disk.
pub struct IncomingUpload<'a> {
    /// Client-supplied file name.
    pub file_name: Option<String>,
    /// Declared content type.
    pub content_type: Option<String>,
    /// Body chunks.
    pub body: BoxStream<'a, Result<Bytes>>,
}

impl<'a> IncomingUpload<'a> {
    /// Create an upload from a chunk stream.
    pub fn new(
        file_name: Option<String>,
        content_type: Option<String>,
        body: BoxStream<'a, Result<Bytes>>,
    ) -> Self {
        Self {
            file_name,
            content_type,
            body,
        }
    }

    /// Create an upload from an already buffered body.
    pub fn from_bytes(
        file_name: Option<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> IncomingUpload<'static> {
        IncomingUpload {
            file_name,
            content_type,
            body: stream::once(async move { Ok(data) }).boxed(),
        }
    }
}

impl std::fmt::Debug for IncomingUpload<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomingUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

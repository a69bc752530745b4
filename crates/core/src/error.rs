//! Error types for Photo Advisor.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using Photo Advisor's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of failures, shared by the pipeline stages.
///
/// This is what travels inside [`crate::types::AnalysisResult::Failure`] and what
/// decides whether a failure may be degraded into a placeholder answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad or missing upload, bad consent. Client-facing 4xx.
    Validation,
    /// Filesystem failure while handling ephemeral uploads.
    Storage,
    /// Missing credential or invalid configuration.
    Configuration,
    /// Remote inference call failed, timed out or returned garbage.
    Inference,
    /// Audit notification failed. Never surfaced to clients.
    Notification,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Inference => "inference",
            ErrorKind::Notification => "notification",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for Photo Advisor.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Consent is required to process images")]
    ConsentRequired,

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Upload too large: files are limited to {limit} bytes each")]
    UploadTooLarge { limit: u64 },

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // External Service Errors
    // =========================================================================
    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Notification error: {0}")]
    Notification(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an unsupported media type error.
    pub fn unsupported_media_type(msg: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an inference error.
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a notification error.
    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Rebuild an error from a failure that crossed a component boundary.
    pub fn from_failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Validation => Self::InvalidRequest(message),
            ErrorKind::Storage => Self::Storage(message),
            ErrorKind::Configuration => Self::Configuration(message),
            ErrorKind::Inference => Self::Inference(message),
            ErrorKind::Notification => Self::Notification(message),
            ErrorKind::Internal => Self::Internal(message),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_)
            | Error::ConsentRequired
            | Error::UnsupportedMediaType(_)
            | Error::FileTooLarge { .. }
            | Error::UploadTooLarge { .. } => ErrorKind::Validation,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::Inference(_) | Error::Timeout(_) => ErrorKind::Inference,
            Error::Notification(_) => ErrorKind::Notification,
            Error::Serialization(_) | Error::Internal(_) | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

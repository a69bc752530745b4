use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};

/// Outcome of one inference call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// Generated advisory text.
    Success { text: String },
    /// Typed failure. The orchestrator decides how it reaches the client.
    Failure { kind: ErrorKind, message: String },
}

impl AnalysisResult {
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success { text: text.into() }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }
}

impl From<Error> for AnalysisResult {
    fn from(err: Error) -> Self {
        Self::failure(err.kind(), err.to_string())
    }
}

/// What the orchestrator hands back to the HTTP layer on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReply {
    /// Text for the client.
    pub response: String,
    /// True when `response` is the placeholder substituted for a failed call.
    pub degraded: bool,
}

impl AnalysisReply {
    pub fn answered(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            degraded: false,
        }
    }

    pub fn degraded(placeholder: impl Into<String>) -> Self {
        Self {
            response: placeholder.into(),
            degraded: true,
        }
    }
}

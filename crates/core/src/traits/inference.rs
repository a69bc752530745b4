//! Inference traits.

use async_trait::async_trait;

use crate::types::{AnalysisResult, UploadedImage};

/// Client for the remote vision model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Analyze one image with the user's prompt. Exactly one remote call at most.
    async fn analyze(&self, image: &UploadedImage, user_prompt: &str) -> AnalysisResult;

    /// Whether credentials are present.
    fn is_configured(&self) -> bool;

    /// Model identifier used for every call.
    fn model(&self) -> &str;
}

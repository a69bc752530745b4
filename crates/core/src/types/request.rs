use serde::Serialize;

use super::upload::UploadedImage;

/// Location hint used when the client sends none.
pub const DEFAULT_LOCATION: &str = "Unknown";
/// Device hint used when neither the form nor the user agent provide one.
pub const DEFAULT_DEVICE: &str = "Unknown device";
/// Prompt used when the client sends none.
pub const DEFAULT_PROMPT: &str = "Analyze this image";

/// A validated analysis request.
///
/// Built once per inbound call after both images are stored; immutable after
/// construction.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub problem_image: UploadedImage,
    pub selfie_image: UploadedImage,
    pub consent: bool,
    pub location_hint: String,
    pub device_hint: String,
    pub user_prompt: String,
}

impl AnalysisRequest {
    /// Create a consented request, substituting defaults for blank hints.
    pub fn new(
        problem_image: UploadedImage,
        selfie_image: UploadedImage,
        location_hint: Option<String>,
        device_hint: Option<String>,
        user_prompt: Option<String>,
    ) -> Self {
        Self {
            problem_image,
            selfie_image,
            consent: true,
            location_hint: or_default(location_hint, DEFAULT_LOCATION),
            device_hint: or_default(device_hint, DEFAULT_DEVICE),
            user_prompt: or_default(user_prompt, DEFAULT_PROMPT),
        }
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

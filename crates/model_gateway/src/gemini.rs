//! Gemini vision client.
//!
//! One `generateContent` call per analysis, no retries. Every failure is
//! folded into [`AnalysisResult::Failure`] so the pipeline decides the outcome.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, Secret};

use photo_advisor_core::{
    config::InferenceConfig,
    traits::InferenceClient,
    types::{AnalysisResult, UploadedImage},
    Error, ErrorKind, Result,
};

use crate::prompt::compose_prompt;
use crate::types::{GenerateContentRequest, GenerateContentResponse};

const API_KEY_HEADER: &str = "x-goog-api-key";
/// Upper bound on how much of an error body ends up in a failure message.
const ERROR_BODY_LIMIT: usize = 512;

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Secret<String>,
    model: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Build a client from config. Fails when no API key is set.
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or_else(|| Error::configuration("GEMINI_API_KEY is not set"))?;

        let timeout = Duration::from_secs(config.timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key,
            model: config.model.clone(),
            timeout,
        })
    }

    /// Full URL the client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn build_request(&self, image: &UploadedImage, prompt: String) -> Result<GenerateContentRequest> {
        let bytes = tokio::fs::read(&image.path).await.map_err(|e| {
            Error::storage(format!("Failed to read {} for inference: {}", image.field, e))
        })?;
        Ok(GenerateContentRequest::with_image(
            prompt,
            image.mime_type.clone(),
            STANDARD.encode(bytes),
        ))
    }

    async fn generate(&self, request: &GenerateContentRequest) -> Result<String> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(format!("no answer within {}s", self.timeout.as_secs()))
                } else {
                    Error::inference(format!("request failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(Error::inference(format!("HTTP {}: {}", status, snippet)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| Error::inference(format!("malformed response: {}", e.without_url())))?;

        if let Some(reason) = parsed.block_reason() {
            return Err(Error::inference(format!("prompt blocked: {}", reason)));
        }

        parsed.text().ok_or_else(|| {
            Error::inference(format!(
                "empty response (finish reason: {})",
                parsed.finish_reason().unwrap_or("none")
            ))
        })
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn analyze(&self, image: &UploadedImage, user_prompt: &str) -> AnalysisResult {
        let start = Instant::now();
        let prompt = compose_prompt(user_prompt);

        let outcome = match self.build_request(image, prompt).await {
            Ok(request) => self.generate(&request).await,
            Err(e) => Err(e),
        };

        let elapsed = start.elapsed();
        metrics::histogram!("inference_duration_seconds", "model" => self.model.clone())
            .record(elapsed.as_secs_f64());

        match outcome {
            Ok(text) => {
                tracing::info!(
                    model = %self.model,
                    latency_ms = elapsed.as_millis() as u64,
                    chars = text.len(),
                    "Inference succeeded"
                );
                AnalysisResult::success(text)
            }
            Err(e) => {
                tracing::warn!(
                    model = %self.model,
                    latency_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Inference failed"
                );
                AnalysisResult::from(e)
            }
        }
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Stand-in used when no API key is configured.
///
/// Every call fails with a configuration failure and never touches the network.
pub struct UnconfiguredInferenceClient {
    model: String,
}

impl UnconfiguredInferenceClient {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

#[async_trait]
impl InferenceClient for UnconfiguredInferenceClient {
    async fn analyze(&self, _image: &UploadedImage, _user_prompt: &str) -> AnalysisResult {
        AnalysisResult::failure(ErrorKind::Configuration, "inference API key is not configured")
    }

    fn is_configured(&self) -> bool {
        false
    }

    fn model(&self) -> &str {
        &self.model
    }
}

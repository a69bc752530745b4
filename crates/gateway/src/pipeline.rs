//! Request orchestration for `POST /analyze`.
//!
//! Stages: Received, Validated, Stored, Notified, Inferred, Responded.
//! Every image stored for a request is released before the reply leaves,
//! whatever path the request takes out of the pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::Instrument;
use uuid::Uuid;

use photo_advisor_core::{
    config::{AppConfig, FailurePolicy},
    traits::{ImageStore, InferenceClient, Notifier},
    types::{
        AnalysisReply, AnalysisRequest, AnalysisResult, ImageField, IncomingUpload, UploadedImage,
        PROBLEM_CAPTION, SELFIE_CAPTION,
    },
    Error, ErrorKind, Result,
};
use photo_advisor_governance::{audit_message, create_notifier, track_analysis};
use photo_advisor_model_gateway::create_inference_client;
use photo_advisor_store::EphemeralFileStore;

use crate::form::AnalyzeForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Received,
    Validated,
    Stored,
    Notified,
    Inferred,
    Responded,
}

impl Stage {
    fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validated => "validated",
            Stage::Stored => "stored",
            Stage::Notified => "notified",
            Stage::Inferred => "inferred",
            Stage::Responded => "responded",
        }
    }
}

fn enter(stage: Stage) {
    tracing::debug!(stage = stage.as_str(), "Pipeline stage");
}

/// Knobs the pipeline needs from configuration.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_file_size: u64,
    pub inference_timeout: Duration,
    pub failure_policy: FailurePolicy,
    pub placeholder_response: String,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_file_size: config.upload.max_file_size_bytes,
            inference_timeout: Duration::from_secs(config.inference.timeout_secs),
            failure_policy: config.inference.failure_policy,
            placeholder_response: config.inference.placeholder_response.clone(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Holds every image stored for one request until it is released.
///
/// `release_all` is the normal path. If the scope is dropped while still
/// holding images (panic, cancelled request), `Drop` hands them to the runtime
/// for release, or removes the files synchronously when no runtime is around.
struct UploadScope {
    store: Arc<dyn ImageStore>,
    held: Vec<UploadedImage>,
}

impl UploadScope {
    fn new(store: Arc<dyn ImageStore>) -> Self {
        Self {
            store,
            held: Vec::new(),
        }
    }

    async fn store(&mut self, field: ImageField, upload: IncomingUpload<'_>) -> Result<UploadedImage> {
        let image = self.store.store(field, upload).await?;
        self.held.push(image.clone());
        Ok(image)
    }

    async fn release_all(&mut self) {
        for image in std::mem::take(&mut self.held) {
            release_logged(self.store.as_ref(), &image).await;
        }
    }
}

async fn release_logged(store: &dyn ImageStore, image: &UploadedImage) {
    if let Err(e) = store.release(image).await {
        tracing::warn!(field = %image.field, id = %image.id, error = %e, "Failed to release upload");
    }
}

impl Drop for UploadScope {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let images = std::mem::take(&mut self.held);
        tracing::warn!(count = images.len(), "Releasing uploads from an interrupted request");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                handle.spawn(async move {
                    for image in &images {
                        release_logged(store.as_ref(), image).await;
                    }
                });
            }
            Err(_) => {
                for image in &images {
                    remove_now(image);
                }
            }
        }
    }
}

fn remove_now(image: &UploadedImage) {
    if let Err(e) = std::fs::remove_file(&image.path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(field = %image.field, id = %image.id, error = %e, "Failed to release upload");
        }
    }
}

/// The `POST /analyze` orchestrator.
pub struct AnalysisPipeline {
    store: Arc<dyn ImageStore>,
    notifier: Arc<dyn Notifier>,
    inference: Arc<dyn InferenceClient>,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(
        store: Arc<dyn ImageStore>,
        notifier: Arc<dyn Notifier>,
        inference: Arc<dyn InferenceClient>,
        settings: PipelineSettings,
    ) -> Self {
        tracing::info!(
            model = inference.model(),
            inference_configured = inference.is_configured(),
            notifications = notifier.is_enabled(),
            failure_policy = ?settings.failure_policy,
            "Analysis pipeline ready"
        );
        Self {
            store,
            notifier,
            inference,
            settings,
        }
    }

    /// Wire the production collaborators from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(EphemeralFileStore::from_config(&config.upload)),
            create_notifier(&config.notifier, &config.governance.environment),
            create_inference_client(&config.inference),
            PipelineSettings::from_config(config),
        )
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Handle one submission. `device_fallback` is used when the form has no
    /// `device` field (usually the `User-Agent`).
    pub async fn run(&self, form: AnalyzeForm, device_fallback: Option<String>) -> Result<AnalysisReply> {
        let trace_id = Uuid::new_v4();
        let span = tracing::info_span!("analysis", trace_id = %trace_id);

        async move {
            enter(Stage::Received);
            let outcome = self.execute(form, device_fallback).await;
            enter(Stage::Responded);

            match &outcome {
                Ok(reply) if reply.degraded => track_analysis("degraded"),
                Ok(_) => track_analysis("answered"),
                Err(e) if e.kind() == ErrorKind::Validation => {
                    tracing::info!(error = %e, "Request rejected");
                    track_analysis("rejected")
                }
                Err(e) => {
                    tracing::error!(error = %e, kind = %e.kind(), "Analysis failed");
                    track_analysis("failed")
                }
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, form: AnalyzeForm, device_fallback: Option<String>) -> Result<AnalysisReply> {
        let received_at = Utc::now();
        let submission = form.validate(self.settings.max_file_size)?;
        enter(Stage::Validated);

        let mut scope = UploadScope::new(self.store.clone());
        let outcome = async {
            let problem = scope
                .store(ImageField::Problem, submission.problem.into_upload())
                .await?;
            let selfie = scope
                .store(ImageField::Selfie, submission.selfie.into_upload())
                .await?;
            tracing::info!(
                problem_size = problem.size_bytes,
                selfie_size = selfie.size_bytes,
                "Uploads stored"
            );
            enter(Stage::Stored);

            let request = AnalysisRequest::new(
                problem,
                selfie,
                submission.location,
                submission.device.or(device_fallback),
                submission.prompt,
            );

            let ((), result) = tokio::join!(
                self.notify(&request, received_at),
                self.infer(&request)
            );
            enter(Stage::Inferred);

            self.resolve(result)
        }
        .await;

        scope.release_all().await;
        outcome
    }

    /// Text first, then the problem photo, then the selfie.
    async fn notify(&self, request: &AnalysisRequest, received_at: DateTime<Utc>) {
        self.notifier
            .notify_text(&audit_message(request, received_at))
            .await;
        self.notifier
            .notify_photo(&request.problem_image, PROBLEM_CAPTION)
            .await;
        self.notifier
            .notify_photo(&request.selfie_image, SELFIE_CAPTION)
            .await;
        enter(Stage::Notified);
    }

    async fn infer(&self, request: &AnalysisRequest) -> AnalysisResult {
        let timeout = self.settings.inference_timeout;
        let call = self
            .inference
            .analyze(&request.problem_image, &request.user_prompt);

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => AnalysisResult::from(Error::Timeout(format!(
                "inference did not answer within {}s",
                timeout.as_secs()
            ))),
        }
    }

    fn resolve(&self, result: AnalysisResult) -> Result<AnalysisReply> {
        match result {
            AnalysisResult::Success { text } => Ok(AnalysisReply::answered(text)),
            AnalysisResult::Failure {
                kind: ErrorKind::Inference,
                message,
            } if self.settings.failure_policy == FailurePolicy::Degrade => {
                tracing::warn!(error = %message, "Inference failed, answering with placeholder");
                Ok(AnalysisReply::degraded(
                    self.settings.placeholder_response.clone(),
                ))
            }
            AnalysisResult::Failure { kind, message } => Err(Error::from_failure(kind, message)),
        }
    }
}

//! Mock implementations of core traits for testing.
//!
//! These record every call so tests can assert on call counts and ordering
//! without any network or filesystem access.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    traits::{ImageStore, InferenceClient, Notifier},
    types::{AnalysisResult, ImageField, IncomingUpload, NotificationEvent, UploadedImage},
    Error, ErrorKind, Result,
};

// =============================================================================
// Mock Inference Client
// =============================================================================

/// Scripted inference client returning a fixed result.
pub struct MockInferenceClient {
    result: AnalysisResult,
    delay: Option<Duration>,
    calls: Mutex<Vec<(UploadedImage, String)>>,
}

impl MockInferenceClient {
    /// Always answer with `text`.
    pub fn answering(text: &str) -> Self {
        Self::with_result(AnalysisResult::success(text))
    }

    /// Always fail with an inference error.
    pub fn failing(message: &str) -> Self {
        Self::with_result(AnalysisResult::failure(ErrorKind::Inference, message))
    }

    /// Always return `result`.
    pub fn with_result(result: AnalysisResult) -> Self {
        Self {
            result,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of analyze calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Images and prompts seen so far.
    pub fn calls(&self) -> Vec<(UploadedImage, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn analyze(&self, image: &UploadedImage, user_prompt: &str) -> AnalysisResult {
        self.calls
            .lock()
            .unwrap()
            .push((image.clone(), user_prompt.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }

    fn is_configured(&self) -> bool {
        !matches!(
            self.result,
            AnalysisResult::Failure {
                kind: ErrorKind::Configuration,
                ..
            }
        )
    }

    fn model(&self) -> &str {
        "mock-vision"
    }
}

// =============================================================================
// Recording Notifier
// =============================================================================

/// Notifier that records every event instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notify calls.
    pub fn call_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Recorded events, in call order.
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_text(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::text(message));
    }

    async fn notify_photo(&self, image: &UploadedImage, caption: &str) {
        self.events
            .lock()
            .unwrap()
            .push(NotificationEvent::photo(image.clone(), caption));
    }
}

// =============================================================================
// Mock Image Store
// =============================================================================

/// In-memory image store that tracks what is currently held.
#[derive(Default)]
pub struct MockImageStore {
    held: Mutex<HashMap<Uuid, Vec<u8>>>,
    release_calls: Mutex<Vec<Uuid>>,
    fail_on: Option<ImageField>,
}

impl MockImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with a storage error when asked to store `field`.
    pub fn failing_on(field: ImageField) -> Self {
        Self {
            fail_on: Some(field),
            ..Default::default()
        }
    }

    /// Number of images stored and not yet released.
    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    /// Every release call, including repeated ones.
    pub fn release_calls(&self) -> Vec<Uuid> {
        self.release_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn store(&self, field: ImageField, mut upload: IncomingUpload<'_>) -> Result<UploadedImage> {
        if self.fail_on == Some(field) {
            return Err(Error::storage(format!("simulated failure storing {}", field)));
        }
        let mut data = Vec::new();
        while let Some(chunk) = upload.body.next().await {
            data.extend_from_slice(&chunk?);
        }
        let id = Uuid::new_v4();
        let image = UploadedImage {
            id,
            field,
            path: PathBuf::from(format!("mock://{}/{}", field, id)),
            mime_type: upload
                .content_type
                .unwrap_or_else(|| "application/octet-stream".into()),
            size_bytes: data.len() as u64,
            file_name: upload.file_name,
        };
        self.held.lock().unwrap().insert(id, data);
        Ok(image)
    }

    async fn release(&self, image: &UploadedImage) -> Result<()> {
        self.release_calls.lock().unwrap().push(image.id);
        self.held.lock().unwrap().remove(&image.id);
        Ok(())
    }
}

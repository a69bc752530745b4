//! Best-effort audit notifications over the Telegram Bot API.
//!
//! Nothing in here returns an error to the caller. Failures are logged and
//! counted, then dropped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use photo_advisor_core::{
    config::NotifierConfig,
    traits::Notifier,
    types::{AnalysisRequest, NotificationKind, UploadedImage},
    Error, Result,
};

use crate::metrics::track_notification;

/// Prompts longer than this are cut in the audit message.
const MAX_PROMPT_CHARS: usize = 1000;

/// Compact summary of an inbound request for the audit channel.
pub fn audit_message(request: &AnalysisRequest, received_at: DateTime<Utc>) -> String {
    let mut prompt: String = request.user_prompt.chars().take(MAX_PROMPT_CHARS).collect();
    if request.user_prompt.chars().count() > MAX_PROMPT_CHARS {
        prompt.push_str("...");
    }
    format!(
        "New photo analysis request\nTime: {}\nConsent: {}\nLocation: {}\nDevice: {}\nPrompt: {}",
        received_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        if request.consent { "given" } else { "missing" },
        request.location_hint,
        request.device_hint,
        prompt
    )
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    description: Option<String>,
}

/// Notifier posting to one Telegram chat.
pub struct TelegramNotifier {
    http: reqwest::Client,
    base_url: String,
    bot_token: Secret<String>,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        base_url: impl Into<String>,
        bot_token: Secret<String>,
        chat_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_id: chat_id.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.base_url,
            self.bot_token.expose_secret(),
            method
        )
    }

    async fn send_text(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": message,
            }))
            .send()
            .await
            .map_err(transport_error)?;

        check_reply(response).await
    }

    async fn send_photo(&self, image: &UploadedImage, caption: &str) -> Result<()> {
        let bytes = tokio::fs::read(&image.path).await.map_err(|e| {
            Error::notification(format!("Failed to read {} image: {}", image.field, e))
        })?;

        let photo = reqwest::multipart::Part::bytes(bytes)
            .file_name(image.display_name())
            .mime_str(&image.mime_type)
            .map_err(transport_error)?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        check_reply(response).await
    }

    fn record(&self, kind: NotificationKind, outcome: Result<()>) {
        match outcome {
            Ok(()) => {
                tracing::debug!(kind = kind.as_str(), "Audit notification delivered");
                track_notification(kind.as_str(), true);
            }
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "Audit notification failed");
                track_notification(kind.as_str(), false);
            }
        }
    }
}

/// The bot token is part of the URL, so it is stripped before logging.
fn transport_error(e: reqwest::Error) -> Error {
    Error::notification(e.without_url().to_string())
}

async fn check_reply(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    let reply = response.json::<TelegramReply>().await.ok();

    match reply {
        Some(TelegramReply { ok: true, .. }) if status.is_success() => Ok(()),
        Some(TelegramReply { description, .. }) => Err(Error::notification(format!(
            "HTTP {}: {}",
            status,
            description.unwrap_or_else(|| "request rejected".into())
        ))),
        None => Err(Error::notification(format!("HTTP {}: unreadable reply", status))),
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_text(&self, message: &str) {
        let outcome = self.send_text(message).await;
        self.record(NotificationKind::Text, outcome);
    }

    async fn notify_photo(&self, image: &UploadedImage, caption: &str) {
        let outcome = self.send_photo(image, caption).await;
        self.record(NotificationKind::Photo, outcome);
    }
}

/// Notifier used outside the notification environment or without credentials.
#[derive(Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify_text(&self, _message: &str) {}

    async fn notify_photo(&self, _image: &UploadedImage, _caption: &str) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Pick the notifier for this process.
pub fn create_notifier(config: &NotifierConfig, environment: &str) -> Arc<dyn Notifier> {
    if environment != config.enabled_environment {
        tracing::info!(
            environment,
            enabled_environment = %config.enabled_environment,
            "Audit notifications disabled for this environment"
        );
        return Arc::new(NoopNotifier);
    }

    let token = config
        .bot_token
        .clone()
        .filter(|t| !t.expose_secret().trim().is_empty());
    let chat_id = config.chat_id.clone().filter(|c| !c.trim().is_empty());

    let (Some(token), Some(chat_id)) = (token, chat_id) else {
        tracing::warn!("Telegram credentials missing, audit notifications disabled");
        return Arc::new(NoopNotifier);
    };

    match TelegramNotifier::new(
        config.base_url.clone(),
        token,
        chat_id,
        Duration::from_secs(config.timeout_secs),
    ) {
        Ok(notifier) => {
            tracing::info!("Telegram audit notifications enabled");
            Arc::new(notifier)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Telegram notifier, audit notifications disabled");
            Arc::new(NoopNotifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use photo_advisor_core::config::AppConfig;
    use photo_advisor_core::types::ImageField;

    fn image(field: ImageField) -> UploadedImage {
        UploadedImage {
            id: uuid::Uuid::new_v4(),
            field,
            path: format!("/tmp/{}.jpg", field).into(),
            mime_type: "image/jpeg".into(),
            size_bytes: 3,
            file_name: None,
        }
    }

    fn notifier_config(token: Option<&str>, chat_id: Option<&str>) -> NotifierConfig {
        let mut config = AppConfig::default().notifier;
        config.bot_token = token.map(|t| Secret::new(t.to_string()));
        config.chat_id = chat_id.map(str::to_string);
        config
    }

    #[test]
    fn test_audit_message_contents() {
        let request = AnalysisRequest::new(
            image(ImageField::Problem),
            image(ImageField::Selfie),
            Some("Lisbon".into()),
            None,
            Some("What is wrong with this leaf?".into()),
        );
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let message = audit_message(&request, at);

        assert!(message.contains("2024-05-01T12:30:00Z"));
        assert!(message.contains("Consent: given"));
        assert!(message.contains("Location: Lisbon"));
        assert!(message.contains("Device: Unknown device"));
        assert!(message.contains("Prompt: What is wrong with this leaf?"));
    }

    #[test]
    fn test_audit_message_truncates_long_prompt() {
        let request = AnalysisRequest::new(
            image(ImageField::Problem),
            image(ImageField::Selfie),
            None,
            None,
            Some("x".repeat(5000)),
        );
        let message = audit_message(&request, Utc::now());
        assert!(message.len() < 1200);
        assert!(message.ends_with("..."));
    }

    #[test]
    fn test_factory_gating() {
        let full = notifier_config(Some("123:abc"), Some("42"));
        assert!(create_notifier(&full, "production").is_enabled());
        assert!(!create_notifier(&full, "development").is_enabled());

        assert!(!create_notifier(&notifier_config(None, Some("42")), "production").is_enabled());
        assert!(!create_notifier(&notifier_config(Some("123:abc"), None), "production").is_enabled());
        assert!(!create_notifier(&notifier_config(Some(" "), Some("42")), "production").is_enabled());
    }

    #[tokio::test]
    async fn test_noop_notifier_is_silent() {
        let notifier = NoopNotifier;
        notifier.notify_text("hello").await;
        notifier.notify_photo(&image(ImageField::Selfie), "Auto Selfie").await;
        assert!(!notifier.is_enabled());
    }
}

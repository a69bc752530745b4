//! Audit channel traits.

use async_trait::async_trait;

use crate::types::{NotificationEvent, UploadedImage};

/// Best-effort audit notifier.
///
/// Implementations must never fail or panic towards the caller: transport
/// errors are logged and swallowed inside the implementation.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a text message.
    async fn notify_text(&self, message: &str);

    /// Send an image with a caption.
    async fn notify_photo(&self, image: &UploadedImage, caption: &str);

    /// Whether calls reach a real channel.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Send one event.
    async fn dispatch(&self, event: &NotificationEvent) {
        match event {
            NotificationEvent::Text { message } => self.notify_text(message).await,
            NotificationEvent::Photo { image, caption } => {
                self.notify_photo(image, caption).await
            }
        }
    }
}

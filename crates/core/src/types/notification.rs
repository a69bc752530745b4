use serde::Serialize;

use super::upload::UploadedImage;

/// Caption attached to the problem photo.
pub const PROBLEM_CAPTION: &str = "Problem Image";
/// Caption attached to the selfie.
pub const SELFIE_CAPTION: &str = "Auto Selfie";

/// Kind of an audit notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Text,
    Photo,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Text => "text",
            NotificationKind::Photo => "photo",
        }
    }
}

/// One fire-and-forget audit notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    Text { message: String },
    Photo { image: UploadedImage, caption: String },
}

impl NotificationEvent {
    pub fn text(message: impl Into<String>) -> Self {
        Self::Text {
            message: message.into(),
        }
    }

    pub fn photo(image: UploadedImage, caption: impl Into<String>) -> Self {
        Self::Photo {
            image,
            caption: caption.into(),
        }
    }
}

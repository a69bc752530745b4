//! `POST /analyze` multipart form.
//!
//! The form is read fully before anything touches disk so that missing images
//! and missing consent are rejected without writing a byte.

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};

use photo_advisor_core::{
    types::{ImageField, IncomingUpload},
    Error, Result,
};

/// One uploaded file as read from the form.
///
/// When the part exceeds the ceiling, `data` is empty and `size` holds the
/// number of bytes seen.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
    pub size: u64,
}

impl FilePart {
    pub fn into_upload(self) -> IncomingUpload<'static> {
        IncomingUpload::from_bytes(self.file_name, self.content_type, self.data)
    }
}

/// Raw form fields, nothing validated yet.
///
/// `body_too_large` is set when the request body hit its limit. Fields after
/// that point were never seen.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeForm {
    pub image: Option<FilePart>,
    pub selfie: Option<FilePart>,
    pub consent: Option<String>,
    pub location: Option<String>,
    pub prompt: Option<String>,
    pub device: Option<String>,
    pub body_too_large: bool,
}

/// A form that passed presence and consent checks.
#[derive(Debug, Clone)]
pub struct Submission {
    pub problem: FilePart,
    pub selfie: FilePart,
    pub location: Option<String>,
    pub prompt: Option<String>,
    pub device: Option<String>,
}

impl AnalyzeForm {
    /// Read every field of the multipart body.
    ///
    /// File parts larger than `max_file_size` are drained but not buffered.
    /// Reading stops at the body limit and keeps whatever was read so far.
    pub async fn from_multipart(mut multipart: Multipart, max_file_size: u64) -> Result<Self> {
        let mut form = AnalyzeForm::default();

        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) if over_body_limit(&e) => {
                    form.body_too_large = true;
                    break;
                }
                Err(e) => return Err(malformed(e)),
            };
            let name = field.name().unwrap_or_default().to_string();

            if let Some(image_field) = ImageField::from_form_name(&name) {
                if form.slot(image_field).is_some() {
                    return Err(Error::invalid_request(format!(
                        "Only one '{}' file is allowed",
                        name
                    )));
                }
                let (part, complete) = read_file(field, max_file_size).await?;
                *form.slot(image_field) = Some(part);
                if !complete {
                    form.body_too_large = true;
                    break;
                }
                continue;
            }

            if !matches!(name.as_str(), "consent" | "location" | "prompt" | "device") {
                tracing::debug!(field = %name, "Ignoring unknown form field");
                continue;
            }
            let value = match field.text().await {
                Ok(value) => value,
                Err(e) if over_body_limit(&e) => {
                    form.body_too_large = true;
                    break;
                }
                Err(e) => return Err(malformed(e)),
            };
            match name.as_str() {
                "consent" => form.consent = Some(value),
                "location" => form.location = Some(value),
                "prompt" => form.prompt = Some(value),
                _ => form.device = Some(value),
            }
        }

        Ok(form)
    }

    fn slot(&mut self, field: ImageField) -> &mut Option<FilePart> {
        match field {
            ImageField::Problem => &mut self.image,
            ImageField::Selfie => &mut self.selfie,
        }
    }

    /// Check presence, then consent, then per-file size.
    ///
    /// A truncated body answers with what was seen: a consent other than
    /// `"true"` is refused, an image never reached counts as missing, and
    /// anything else is an oversized upload.
    pub fn validate(self, max_file_size: u64) -> Result<Submission> {
        if self.body_too_large {
            if self.consent.as_deref().is_some_and(|c| c != "true") {
                return Err(Error::ConsentRequired);
            }
            if self.image.is_none() || self.selfie.is_none() {
                return Err(missing_images());
            }
            return Err(Error::UploadTooLarge {
                limit: max_file_size,
            });
        }

        let (Some(problem), Some(selfie)) = (self.image, self.selfie) else {
            return Err(missing_images());
        };

        if self.consent.as_deref() != Some("true") {
            return Err(Error::ConsentRequired);
        }

        for part in [&problem, &selfie] {
            if part.size > max_file_size {
                return Err(Error::FileTooLarge {
                    size: part.size,
                    limit: max_file_size,
                });
            }
        }

        Ok(Submission {
            problem,
            selfie,
            location: self.location,
            prompt: self.prompt,
            device: self.device,
        })
    }
}

fn missing_images() -> Error {
    Error::invalid_request("Both 'image' and 'selfie' files are required")
}

/// Returns the part and whether it was read to its end.
async fn read_file(mut field: Field<'_>, max_file_size: u64) -> Result<(FilePart, bool)> {
    let file_name = field
        .file_name()
        .map(str::to_string)
        .filter(|n| !n.is_empty());
    let content_type = field.content_type().map(str::to_string);

    let mut buffer = BytesMut::new();
    let mut size = 0u64;
    let complete = loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break true,
            Err(e) if over_body_limit(&e) => break false,
            Err(e) => return Err(malformed(e)),
        };
        size += chunk.len() as u64;
        if size <= max_file_size {
            buffer.extend_from_slice(&chunk);
        } else {
            buffer.clear();
        }
    };

    let part = FilePart {
        file_name,
        content_type,
        data: buffer.freeze(),
        size,
    };
    Ok((part, complete))
}

fn over_body_limit(e: &MultipartError) -> bool {
    e.status() == StatusCode::PAYLOAD_TOO_LARGE
}

fn malformed(e: MultipartError) -> Error {
    Error::invalid_request(format!("Malformed multipart body: {}", e.body_text()))
}

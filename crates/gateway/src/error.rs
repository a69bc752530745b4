//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use photo_advisor_core::{Error, ErrorKind};

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
}

/// Pipeline error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Error::ConsentRequired => StatusCode::FORBIDDEN,
            Error::UnsupportedMediaType(_)
            | Error::FileTooLarge { .. }
            | Error::UploadTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing message. Server-side details stay in the logs.
    pub fn public_message(&self) -> String {
        if self.status().is_client_error() {
            return self.0.to_string();
        }
        match self.0.kind() {
            ErrorKind::Inference => "Image analysis failed, please try again later",
            ErrorKind::Configuration => "Image analysis is not available",
            _ => "Internal server error",
        }
        .to_string()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            success: false,
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

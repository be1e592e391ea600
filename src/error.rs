use std::io::ErrorKind;

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Line busy: {0}")]
    LineBusy(String),
    #[error("GPIO error: {0}")]
    Gpio(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::LineBusy(_) => StatusCode::CONFLICT,
            AppError::Config(_) | AppError::Gpio(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl AppError {
    /// Classifies a failed OS call on a GPIO device by its error kind.
    pub fn from_os_error(context: &str, err: &std::io::Error) -> Self {
        let msg = format!("{context}: {err}");
        match err.kind() {
            ErrorKind::PermissionDenied => AppError::PermissionDenied(msg),
            ErrorKind::ResourceBusy => AppError::LineBusy(msg),
            ErrorKind::NotFound | ErrorKind::InvalidInput => AppError::Config(msg),
            _ => AppError::Gpio(msg),
        }
    }
}

impl From<AppError> for std::io::Error {
    fn from(err: AppError) -> Self {
        std::io::Error::other(err.to_string())
    }
}

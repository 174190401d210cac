use crate::services::archive_service::ArchiveError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Map service outcomes onto HTTP statuses: user-input problems are 422,
/// a failed upload to remote storage is 502, everything else is 500.
impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        let status = match &err {
            ArchiveError::MissingLocation
            | ArchiveError::GeocodingFailed
            | ArchiveError::InvalidCoordinates => StatusCode::UNPROCESSABLE_ENTITY,
            ArchiveError::Storage(_) => StatusCode::BAD_GATEWAY,
            ArchiveError::RecordStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.to_string())
    }
}

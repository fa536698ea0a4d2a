// Application error taxonomy and its HTTP mapping.
//
// Every failure on a request path ends up as one of these variants. The
// `IntoResponse` impl turns them into `{"detail": "..."}` JSON bodies, which
// is the shape existing clients of this API read.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bearer credential absent, malformed, or unknown.
    #[error("Invalid token")]
    Unauthorized,

    /// Recognized token without the admin flag.
    #[error("Admin access needed for this action")]
    Forbidden,

    /// Delete targeted a token that does not exist.
    #[error("Token not found")]
    NotFound,

    /// Upload missing or unreadable.
    #[error("{0}")]
    BadRequest(String),

    #[error("Upload exceeds the {0} byte limit")]
    UploadTooLarge(usize),

    /// The classifier call failed (remote error or misconfiguration).
    #[error("Content Safety API error: {0}")]
    Classifier(String),

    #[error("Content Safety API did not respond within {}s", .0.as_secs_f64())]
    ClassifierTimeout(Duration),

    /// The classifier returned data outside its documented range.
    #[error("Content Safety API returned severity {severity} for category '{category}', expected 0-7")]
    InvalidSeverity { category: String, severity: i64 },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UploadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Classifier(_)
            | AppError::ClassifierTimeout(_)
            | AppError::InvalidSeverity { .. }
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), "Internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        crate::web::api_error(status, &message)
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

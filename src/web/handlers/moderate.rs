// POST /moderate: classify one uploaded image.
//
// Expects multipart/form-data with the image in a field named `file`.
// Other fields are ignored.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use tracing::info;

use crate::error::AppError;
use crate::moderation::moderate_image;
use crate::scoring::verdict::ModerationResult;
use crate::web::auth::AuthToken;
use crate::web::AppState;

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

pub async fn moderate(
    State(state): State<AppState>,
    Extension(AuthToken(caller)): Extension<AuthToken>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ModerationResult>, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, state.config.max_upload_bytes))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("<unnamed>").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| upload_error(e, state.config.max_upload_bytes))?;
        info!(file_name = %file_name, size = bytes.len(), "File received");
        image = Some(bytes);
        break;
    }

    let Some(image) = image else {
        return Err(AppError::BadRequest(format!(
            "Missing multipart field '{FILE_FIELD}'"
        )));
    };

    let result = moderate_image(
        state.classifier.as_ref(),
        state.db.as_ref(),
        &caller,
        &image,
        state.config.classifier_timeout,
    )
    .await?;

    Ok(Json(result))
}

fn upload_error(e: MultipartError, limit: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::UploadTooLarge(limit)
    } else {
        AppError::BadRequest(e.body_text())
    }
}

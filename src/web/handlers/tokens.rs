// Token administration: admin-only.
//
// POST   /auth/tokens          mint a token ({"is_admin": bool}, default false)
// GET    /auth/tokens          list all tokens
// DELETE /auth/tokens/{token}  revoke a token (404 if unknown)

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::db::models::Token;
use crate::error::AppError;
use crate::tokens;
use crate::web::AppState;

#[derive(Deserialize, Default)]
pub struct CreateTokenRequest {
    #[serde(default)]
    pub is_admin: bool,
}

/// POST /auth/tokens. A missing body creates a regular token.
pub async fn create_token(
    State(state): State<AppState>,
    body: Option<Json<CreateTokenRequest>>,
) -> Result<Json<Token>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let token = tokens::create_token(state.db.as_ref(), request.is_admin).await?;
    Ok(Json(token))
}

/// GET /auth/tokens
pub async fn list_tokens(State(state): State<AppState>) -> Result<Json<Vec<Token>>, AppError> {
    Ok(Json(tokens::list_tokens(state.db.as_ref()).await?))
}

/// DELETE /auth/tokens/{token}
pub async fn delete_token(
    State(state): State<AppState>,
    Path(value): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    tokens::delete_token(state.db.as_ref(), &value).await?;
    Ok(Json(
        serde_json::json!({ "message": "Token deleted successfully" }),
    ))
}

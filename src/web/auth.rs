// Auth middleware: bearer token validation against the credential store.
//
// Header format: `Authorization: Bearer <token value>`
//
// Two gates, always applied in this order:
//   1. existence: the token must be stored        → 401 otherwise
//   2. privilege: admin routes need is_admin=true → 403 otherwise
//
// A resolved token is inserted into request extensions as `AuthToken` so
// handlers can attribute usage to the caller.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::AppState;
use crate::db::models::Token;
use crate::db::Database;
use crate::error::AppError;

/// The authenticated caller, available to handlers via `Extension<AuthToken>`.
#[derive(Debug, Clone)]
pub struct AuthToken(pub Token);

/// Extract the credential from an `Authorization: Bearer ...` header.
///
/// The scheme is matched case-insensitively. Returns `None` for a missing
/// header, a non-UTF-8 value, another scheme, or an empty credential.
pub fn bearer_credential(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credential = credential.trim();
    (!credential.is_empty()).then_some(credential)
}

/// Resolve the request's bearer token to a stored record.
pub async fn authenticate(db: &dyn Database, headers: &HeaderMap) -> Result<Token, AppError> {
    let Some(credential) = bearer_credential(headers) else {
        debug!("Missing or malformed Authorization header");
        return Err(AppError::Unauthorized);
    };
    match db.get_token(credential).await? {
        Some(token) => Ok(token),
        None => {
            debug!("Unknown bearer token");
            Err(AppError::Unauthorized)
        }
    }
}

/// Privilege check on an already-resolved token.
pub fn require_admin_flag(token: Token) -> Result<Token, AppError> {
    if token.is_admin {
        Ok(token)
    } else {
        Err(AppError::Forbidden)
    }
}

/// Axum middleware: any valid token.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = authenticate(state.db.as_ref(), request.headers()).await?;
    request.extensions_mut().insert(AuthToken(token));
    Ok(next.run(request).await)
}

/// Axum middleware: a valid token carrying the admin flag.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = authenticate(state.db.as_ref(), request.headers()).await?;
    let token = require_admin_flag(token)?;
    request.extensions_mut().insert(AuthToken(token));
    Ok(next.run(request).await)
}

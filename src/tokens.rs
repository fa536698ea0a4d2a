// Token lifecycle: minting, listing, revoking, and the startup bootstrap.
//
// Token values are 32 bytes from the OS CSPRNG, hex-encoded (64 chars).
// Authorization (who may call these) is enforced by the web layer; these
// functions trust their caller.

use chrono::{SubsecRound, Utc};
use rand::rngs::OsRng;
use rand::TryRngCore;
use tracing::info;

use crate::db::models::Token;
use crate::db::Database;
use crate::error::AppError;

/// Number of random bytes behind each token value.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh token value.
pub fn generate_token_value() -> anyhow::Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| anyhow::anyhow!("OS random source unavailable: {e}"))?;
    Ok(hex::encode(bytes))
}

fn new_token(is_admin: bool) -> anyhow::Result<Token> {
    Ok(Token {
        token: generate_token_value()?,
        is_admin,
        // Stores keep microseconds; truncate so the returned record matches
        // what a later list returns.
        created_at: Utc::now().trunc_subsecs(6),
    })
}

/// Mint and store a new token.
pub async fn create_token(db: &dyn Database, is_admin: bool) -> Result<Token, AppError> {
    let token = new_token(is_admin)?;
    db.insert_token(&token).await?;
    info!(is_admin, "Created token");
    Ok(token)
}

/// All stored tokens.
pub async fn list_tokens(db: &dyn Database) -> Result<Vec<Token>, AppError> {
    Ok(db.list_tokens().await?)
}

/// Revoke a token. `NotFound` if no such value is stored.
pub async fn delete_token(db: &dyn Database, value: &str) -> Result<(), AppError> {
    if !db.delete_token(value).await? {
        return Err(AppError::NotFound);
    }
    info!("Deleted token");
    Ok(())
}

/// Ensure an admin token exists, minting one if the store has none.
///
/// Returns the new token when one was created. The caller must surface its
/// value to the operator: it is the only time the plaintext leaves the
/// process unprompted.
pub async fn bootstrap_admin_if_absent(db: &dyn Database) -> anyhow::Result<Option<Token>> {
    if db.has_admin_token().await? {
        return Ok(None);
    }

    let token = new_token(true)?;
    if db.insert_bootstrap_admin(&token).await? {
        info!("Created initial admin token");
        Ok(Some(token))
    } else {
        // Another process won the race
        info!("Admin token appeared during bootstrap, skipping");
        Ok(None)
    }
}

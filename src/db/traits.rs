// Database trait: backend-agnostic async interface for the credential store
// and the usage log.
//
// Implementors: SqliteDatabase (wraps rusqlite), PgDatabase (wraps sqlx).
// All methods are async so both sync (rusqlite via Mutex) and native async
// (sqlx) backends fit behind a single interface.

use anyhow::Result;
use async_trait::async_trait;

use super::models::{StoreSummary, Token, UsageRecord};

#[async_trait]
pub trait Database: Send + Sync {
    // --- Lifecycle ---

    /// Count the number of user-created tables in the database.
    async fn table_count(&self) -> Result<i64>;

    // --- Tokens ---

    /// Store a new token. Fails if the value already exists.
    async fn insert_token(&self, token: &Token) -> Result<()>;

    /// Store `token` as the bootstrap admin, but only if no admin token exists.
    ///
    /// Returns `false` when another admin was already present (including one
    /// inserted concurrently by a second process).
    async fn insert_bootstrap_admin(&self, token: &Token) -> Result<bool>;

    /// Look up a token by its exact value.
    async fn get_token(&self, value: &str) -> Result<Option<Token>>;

    /// All stored tokens.
    async fn list_tokens(&self) -> Result<Vec<Token>>;

    /// Delete a token by value. Returns `true` if a row was removed.
    async fn delete_token(&self, value: &str) -> Result<bool>;

    /// Whether at least one admin-flagged token exists.
    async fn has_admin_token(&self) -> Result<bool>;

    // --- Usage log ---

    /// Append a usage record.
    async fn record_usage(&self, usage: &UsageRecord) -> Result<()>;

    /// Most recent usage records, newest first.
    async fn recent_usage(&self, limit: u32) -> Result<Vec<UsageRecord>>;

    // --- Reporting ---

    /// Token and usage counts.
    async fn summary(&self) -> Result<StoreSummary>;
}

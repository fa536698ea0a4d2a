// Database queries: CRUD operations for all tables.
//
// Every database interaction goes through this module. This keeps SQL
// contained in one place and gives the rest of the app clean Rust interfaces.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{StoreSummary, Token, UsageRecord};

// --- Tokens ---

/// Insert a token row.
pub fn insert_token(conn: &Connection, token: &Token) -> Result<()> {
    conn.execute(
        "INSERT INTO tokens (token, is_admin, created_at) VALUES (?1, ?2, ?3)",
        params![token.token, token.is_admin, format_timestamp(&token.created_at)],
    )?;
    Ok(())
}

/// Insert the bootstrap admin unless an admin already exists.
///
/// The NOT EXISTS guard covers the common case; the partial unique index on
/// `bootstrap` turns a concurrent second insert into a no-op.
pub fn insert_bootstrap_admin(conn: &Connection, token: &Token) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO tokens (token, is_admin, created_at, bootstrap)
         SELECT ?1, 1, ?2, 1
         WHERE NOT EXISTS (SELECT 1 FROM tokens WHERE is_admin = 1)",
        params![token.token, format_timestamp(&token.created_at)],
    )?;
    Ok(inserted == 1)
}

/// Look up a token by value.
pub fn get_token(conn: &Connection, value: &str) -> Result<Option<Token>> {
    let mut stmt =
        conn.prepare("SELECT token, is_admin, created_at FROM tokens WHERE token = ?1")?;
    let result = stmt.query_row(params![value], row_to_token).optional()?;
    Ok(result)
}

/// All tokens, oldest first.
pub fn list_tokens(conn: &Connection) -> Result<Vec<Token>> {
    let mut stmt =
        conn.prepare("SELECT token, is_admin, created_at FROM tokens ORDER BY created_at")?;
    let tokens = stmt
        .query_map([], row_to_token)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tokens)
}

/// Delete a token. Returns whether a row was removed.
pub fn delete_token(conn: &Connection, value: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM tokens WHERE token = ?1", params![value])?;
    Ok(deleted > 0)
}

/// Whether any admin token exists.
pub fn has_admin_token(conn: &Connection) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tokens WHERE is_admin = 1)",
        [],
        |row| row.get(0),
    )?;
    Ok(exists)
}

// --- Usage log ---

/// Append a usage record.
pub fn record_usage(conn: &Connection, usage: &UsageRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO usages (token, endpoint, timestamp) VALUES (?1, ?2, ?3)",
        params![usage.token, usage.endpoint, format_timestamp(&usage.timestamp)],
    )?;
    Ok(())
}

/// Most recent usage records, newest first.
pub fn recent_usage(conn: &Connection, limit: u32) -> Result<Vec<UsageRecord>> {
    let mut stmt = conn.prepare(
        "SELECT token, endpoint, timestamp FROM usages ORDER BY id DESC LIMIT ?1",
    )?;
    let records = stmt
        .query_map(params![limit], |row| {
            Ok(UsageRecord {
                token: row.get(0)?,
                endpoint: row.get(1)?,
                timestamp: parse_timestamp(row, 2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

// --- Reporting ---

pub fn summary(conn: &Connection) -> Result<StoreSummary> {
    let (admin_tokens, regular_tokens): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(is_admin = 1), 0), COALESCE(SUM(is_admin = 0), 0) FROM tokens",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let usage_records: i64 = conn.query_row("SELECT COUNT(*) FROM usages", [], |row| row.get(0))?;

    Ok(StoreSummary {
        admin_tokens,
        regular_tokens,
        usage_records,
    })
}

// --- Row helpers ---

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        token: row.get(0)?,
        is_admin: row.get(1)?,
        created_at: parse_timestamp(row, 2)?,
    })
}

/// Timestamps are stored as RFC 3339 text with microsecond precision so that
/// lexical order matches chronological order.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

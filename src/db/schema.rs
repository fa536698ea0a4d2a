// Database schema: table creation and migrations.
//
// We use a simple version-based migration approach: a `schema_version` table
// tracks which migrations have run, and each migration is a function that
// executes SQL statements.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all tables if they don't exist yet.
///
/// Idempotent, so safe to call on every startup.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Tracks schema version for future migrations
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Bearer credentials. The value itself is the primary key.
        CREATE TABLE IF NOT EXISTS tokens (
            token TEXT PRIMARY KEY,            -- 64 hex chars
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL           -- RFC 3339, UTC
        );

        -- Append-only usage log. token is a copy, not a foreign key,
        -- so rows outlive the token they reference.
        CREATE TABLE IF NOT EXISTS usages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            timestamp TEXT NOT NULL            -- RFC 3339, UTC
        );

        -- Admin lookups happen on every startup
        CREATE INDEX IF NOT EXISTS idx_tokens_admin
            ON tokens(is_admin);

        CREATE INDEX IF NOT EXISTS idx_usages_token
            ON usages(token);
        ",
    )
    .context("Failed to create database tables")?;

    // Record initial schema version if not already set
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [1],
    )?;

    // Migration v2: mark the token minted at startup so that at most one
    // bootstrap admin can ever exist, even when two processes race.
    run_migration(conn, 2, |c| {
        c.execute_batch(
            "ALTER TABLE tokens ADD COLUMN bootstrap INTEGER NOT NULL DEFAULT 0;
             CREATE UNIQUE INDEX IF NOT EXISTS idx_tokens_single_bootstrap
                 ON tokens(bootstrap) WHERE bootstrap = 1;",
        )
    })?;

    Ok(())
}

/// Run a migration if it hasn't been applied yet.
/// The migration function receives the connection and should execute its SQL.
fn run_migration<F>(conn: &Connection, version: i64, migrate: F) -> Result<()>
where
    F: FnOnce(&Connection) -> rusqlite::Result<()>,
{
    let already_applied: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM schema_version WHERE version = ?1",
        [version],
        |row| row.get(0),
    )?;

    if !already_applied {
        migrate(conn).with_context(|| format!("Migration v{version} failed"))?;
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [version],
        )?;
    }

    Ok(())
}

/// Count the number of tables in the database (useful for init confirmation).
pub fn table_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

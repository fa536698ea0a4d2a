// PgDatabase: PostgreSQL backend implementing the Database trait.
//
// Uses sqlx PgPool for native async queries. All queries use runtime
// parameter binding (not compile-time macros) to avoid requiring
// DATABASE_URL at compile time.
//
// Key differences from SQLite:
// - TIMESTAMPTZ instead of TEXT for timestamps
// - BOOLEAN instead of INTEGER flags
// - $1/$2 parameter syntax (handled by sqlx)
// - GENERATED ALWAYS AS IDENTITY for auto-increment

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx_core::pool::Pool;
use sqlx_core::row::Row;
use sqlx_postgres::{PgRow, Postgres};

use super::models::{StoreSummary, Token, UsageRecord};
use super::traits::Database;

/// Type alias for the PostgreSQL connection pool.
pub type PgPool = Pool<Postgres>;

pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connect to PostgreSQL and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending migrations.
    ///
    /// Acquires a session-level advisory lock so that replicas starting
    /// together don't race to apply the same migration. The lock and unlock
    /// must run on the same physical connection, so a dedicated connection is
    /// held for the whole loop. The unlock always runs, even if a migration
    /// fails.
    async fn run_migrations(&self) -> Result<()> {
        // ASCII "IMGMOD" as a big-endian integer.
        const MIGRATION_LOCK_KEY: i64 = 0x494D_474D_4F44;

        let mut lock_conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection for migration advisory lock")?;

        sqlx_core::query::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to acquire migration advisory lock")?;

        let migration_result: Result<()> = async {
            sqlx_core::query::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
            )
            .execute(&self.pool)
            .await?;

            let migrations = [
                (
                    1,
                    include_str!("../../migrations/postgres/0001_initial.sql"),
                ),
                (
                    2,
                    include_str!("../../migrations/postgres/0002_bootstrap_admin.sql"),
                ),
            ];

            for (version, sql) in migrations {
                let applied: bool = sqlx_core::query::query(
                    "SELECT COUNT(*) > 0 FROM schema_version WHERE version = $1",
                )
                .bind(version)
                .fetch_one(&self.pool)
                .await
                .map(|row| row.get::<bool, _>(0))
                .with_context(|| format!("Failed to check migration v{version}"))?;

                if !applied {
                    // The schema change and its schema_version insert are
                    // committed or rolled back together.
                    let mut tx = self.pool.begin().await?;
                    sqlx_core::raw_sql::raw_sql(sql).execute(&mut *tx).await?;
                    tx.commit()
                        .await
                        .with_context(|| format!("Migration v{version} failed"))?;
                }
            }

            Ok(())
        }
        .await;

        let unlock_result = sqlx_core::query::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_KEY)
            .execute(&mut *lock_conn)
            .await
            .context("Failed to release migration advisory lock");

        // Migration error takes priority over unlock error.
        migration_result?;
        unlock_result?;

        Ok(())
    }
}

fn row_to_token(row: &PgRow) -> Token {
    Token {
        token: row.get::<String, _>(0),
        is_admin: row.get::<bool, _>(1),
        created_at: row.get::<DateTime<Utc>, _>(2),
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn table_count(&self) -> Result<i64> {
        let row = sqlx_core::query::query(
            "SELECT COUNT(*)::bigint FROM information_schema.tables
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>(0))
    }

    async fn insert_token(&self, token: &Token) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO tokens (token, is_admin, created_at) VALUES ($1, $2, $3)",
        )
        .bind(&token.token)
        .bind(token.is_admin)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_bootstrap_admin(&self, token: &Token) -> Result<bool> {
        // Under READ COMMITTED two replicas can both pass NOT EXISTS; the
        // partial unique index on `bootstrap` makes the loser a no-op.
        let result = sqlx_core::query::query(
            "INSERT INTO tokens (token, is_admin, created_at, bootstrap)
             SELECT $1, TRUE, $2, TRUE
             WHERE NOT EXISTS (SELECT 1 FROM tokens WHERE is_admin)
             ON CONFLICT DO NOTHING",
        )
        .bind(&token.token)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        let row =
            sqlx_core::query::query("SELECT token, is_admin, created_at FROM tokens WHERE token = $1")
                .bind(value)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.as_ref().map(row_to_token))
    }

    async fn list_tokens(&self) -> Result<Vec<Token>> {
        let rows = sqlx_core::query::query(
            "SELECT token, is_admin, created_at FROM tokens ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_token).collect())
    }

    async fn delete_token(&self, value: &str) -> Result<bool> {
        let result = sqlx_core::query::query("DELETE FROM tokens WHERE token = $1")
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn has_admin_token(&self) -> Result<bool> {
        let row = sqlx_core::query::query("SELECT EXISTS(SELECT 1 FROM tokens WHERE is_admin)")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<bool, _>(0))
    }

    async fn record_usage(&self, usage: &UsageRecord) -> Result<()> {
        sqlx_core::query::query(
            "INSERT INTO usages (token, endpoint, timestamp) VALUES ($1, $2, $3)",
        )
        .bind(&usage.token)
        .bind(&usage.endpoint)
        .bind(usage.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_usage(&self, limit: u32) -> Result<Vec<UsageRecord>> {
        let rows = sqlx_core::query::query(
            "SELECT token, endpoint, timestamp FROM usages ORDER BY id DESC LIMIT $1",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|r| UsageRecord {
                token: r.get::<String, _>(0),
                endpoint: r.get::<String, _>(1),
                timestamp: r.get::<DateTime<Utc>, _>(2),
            })
            .collect())
    }

    async fn summary(&self) -> Result<StoreSummary> {
        let row = sqlx_core::query::query(
            "SELECT
                (SELECT COUNT(*) FROM tokens WHERE is_admin)::bigint,
                (SELECT COUNT(*) FROM tokens WHERE NOT is_admin)::bigint,
                (SELECT COUNT(*) FROM usages)::bigint",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StoreSummary {
            admin_tokens: row.get::<i64, _>(0),
            regular_tokens: row.get::<i64, _>(1),
            usage_records: row.get::<i64, _>(2),
        })
    }
}

// SqliteDatabase: rusqlite backend implementing the Database trait.
//
// The Connection is wrapped in tokio::sync::Mutex because Connection is !Sync.
// Trait methods lock the mutex, do synchronous rusqlite work, and return.
// The lock is never held across .await points.
//
// The free functions in queries.rs stay usable against a bare Connection so
// their unit tests don't need a runtime.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use tokio::sync::Mutex;

use super::models::{StoreSummary, Token, UsageRecord};
use super::traits::Database;

pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    /// Wrap an already-opened rusqlite Connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Fresh in-memory database with the schema applied.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        super::schema::create_tables(&conn)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn table_count(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        super::schema::table_count(&conn)
    }

    async fn insert_token(&self, token: &Token) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::insert_token(&conn, token)
    }

    async fn insert_bootstrap_admin(&self, token: &Token) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::insert_bootstrap_admin(&conn, token)
    }

    async fn get_token(&self, value: &str) -> Result<Option<Token>> {
        let conn = self.conn.lock().await;
        super::queries::get_token(&conn, value)
    }

    async fn list_tokens(&self) -> Result<Vec<Token>> {
        let conn = self.conn.lock().await;
        super::queries::list_tokens(&conn)
    }

    async fn delete_token(&self, value: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::delete_token(&conn, value)
    }

    async fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn.lock().await;
        super::queries::has_admin_token(&conn)
    }

    async fn record_usage(&self, usage: &UsageRecord) -> Result<()> {
        let conn = self.conn.lock().await;
        super::queries::record_usage(&conn, usage)
    }

    async fn recent_usage(&self, limit: u32) -> Result<Vec<UsageRecord>> {
        let conn = self.conn.lock().await;
        super::queries::recent_usage(&conn, limit)
    }

    async fn summary(&self) -> Result<StoreSummary> {
        let conn = self.conn.lock().await;
        super::queries::summary(&conn)
    }
}

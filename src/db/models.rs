// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the application. They're separate
// from the database queries so other modules can use them without depending
// on rusqlite directly.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A bearer credential. Immutable once created; the only mutation is deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 64 hex characters (32 bytes from the OS CSPRNG)
    pub token: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// One audit entry per successful moderation call.
///
/// `token` is a copy of the caller's token value, not a foreign key, so the
/// history survives token deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub token: String,
    pub endpoint: String,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    /// Build a record stamped with the current time.
    pub fn now(token: &str, endpoint: &str) -> Self {
        Self {
            token: token.to_string(),
            endpoint: endpoint.to_string(),
            timestamp: Utc::now().trunc_subsecs(6),
        }
    }
}

/// Aggregate counts shown by `imgmod status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub admin_tokens: i64,
    pub regular_tokens: i64,
    pub usage_records: i64,
}

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::db::error::{DbError, DbResult};

/// Parse a UUID string from the database, returning a DbError on failure
pub fn parse_uuid(s: &str) -> DbResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DbError::Internal(format!("Invalid UUID in database: {}", e)))
}

/// Parse an optional UUID column.
pub fn parse_optional_uuid(s: Option<String>) -> DbResult<Option<Uuid>> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Current time truncated to milliseconds so stored and returned values compare equal.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Map a unique constraint violation to `DbError::Conflict`, passing other errors through.
pub fn conflict_on_unique(e: sqlx::Error, message: impl FnOnce() -> String) -> DbError {
    match e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            DbError::Conflict(message())
        }
        other => DbError::from(other),
    }
}

/// `?, ?, ?` with `n` placeholders.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

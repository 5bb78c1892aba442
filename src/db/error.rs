use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database not configured")]
    NotConfigured,

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[cfg(feature = "database-sqlite")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[cfg(feature = "database-sqlite")]
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Whether this error means the store could not be reached or answered
    /// unexpectedly, as opposed to a well-formed "no"/"not there" response.
    pub fn is_unavailable(&self) -> bool {
        !matches!(
            self,
            DbError::NotFound | DbError::Conflict(_) | DbError::Validation(_)
        )
    }
}

pub type DbResult<T> = Result<T, DbError>;

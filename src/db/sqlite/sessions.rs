use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{now, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::SessionRepo,
    },
    models::{CreateSession, Session},
};

const SESSION_COLUMNS: &str = r#"
    id, user_id, token_hash, ip_address, user_agent, created_at, expires_at, revoked_at
"#;

pub struct SqliteSessionRepo {
    pool: SqlitePool,
}

impl SqliteSessionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_session(row: &sqlx::sqlite::SqliteRow) -> DbResult<Session> {
        Ok(Session {
            id: parse_uuid(row.get("id"))?,
            user_id: parse_uuid(row.get("user_id"))?,
            token_hash: row.get("token_hash"),
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
            created_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
            revoked_at: row.get("revoked_at"),
        })
    }
}

#[async_trait]
impl SessionRepo for SqliteSessionRepo {
    async fn create(&self, input: CreateSession) -> DbResult<Session> {
        let id = Uuid::new_v4();
        let now = now();

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, user_id, token_hash, ip_address, user_agent, created_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.user_id.to_string())
        .bind(&input.token_hash)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .bind(now)
        .bind(input.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(Session {
            id,
            user_id: input.user_id,
            token_hash: input.token_hash,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            created_at: now,
            expires_at: input.expires_at,
            revoked_at: None,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Session>> {
        let query = format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_session(&r)).transpose()
    }

    async fn get_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Session>> {
        let query = format!(
            "SELECT {} FROM sessions WHERE token_hash = ?",
            SESSION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_session(&r)).transpose()
    }

    async fn rotate(&self, id: Uuid, old_hash: &str, new_hash: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET token_hash = ?
            WHERE id = ? AND token_hash = ? AND revoked_at IS NULL
            "#,
        )
        .bind(new_hash)
        .bind(id.to_string())
        .bind(old_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = COALESCE(revoked_at, ?) WHERE id = ?",
        )
        .bind(now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL",
        )
        .bind(now())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{conflict_on_unique, now, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::ConnectionRepo,
    },
    models::{Connection, CreateConnection},
};

const CONNECTION_COLUMNS: &str = r#"
    id, name, host, port, database, description, is_default, created_at, updated_at
"#;

pub struct SqliteConnectionRepo {
    pool: SqlitePool,
}

impl SqliteConnectionRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_connection(row: &sqlx::sqlite::SqliteRow) -> DbResult<Connection> {
        let port: i64 = row.get("port");
        let is_default: i32 = row.get("is_default");

        Ok(Connection {
            id: parse_uuid(row.get("id"))?,
            name: row.get("name"),
            host: row.get("host"),
            port: u16::try_from(port)
                .map_err(|_| DbError::Internal(format!("Invalid port in database: {}", port)))?,
            database: row.get("database"),
            description: row.get("description"),
            is_default: is_default != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ConnectionRepo for SqliteConnectionRepo {
    async fn create(&self, input: CreateConnection) -> DbResult<Connection> {
        let id = Uuid::new_v4();
        let now = now();

        let mut tx = self.pool.begin().await?;

        if input.is_default {
            sqlx::query("UPDATE connections SET is_default = 0 WHERE is_default = 1")
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO connections (
                id, name, host, port, database, description, is_default, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.name)
        .bind(&input.host)
        .bind(i64::from(input.port))
        .bind(&input.database)
        .bind(&input.description)
        .bind(input.is_default as i32)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || format!("Connection '{}' already exists", input.name))
        })?;

        tx.commit().await?;

        Ok(Connection {
            id,
            name: input.name,
            host: input.host,
            port: input.port,
            database: input.database,
            description: input.description,
            is_default: input.is_default,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Connection>> {
        let query = format!(
            "SELECT {} FROM connections WHERE id = ?",
            CONNECTION_COLUMNS
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_connection(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<Connection>> {
        let query = format!(
            "SELECT {} FROM connections ORDER BY is_default DESC, name ASC",
            CONNECTION_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::parse_connection).collect()
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM access_rules WHERE connection_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{now, parse_optional_uuid, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{AuditLogRepo, ListParams, ListResult},
    },
    models::{AuditLog, AuditLogQuery, AuditStatus, CreateAuditLog},
};

const AUDIT_COLUMNS: &str = r#"
    id, timestamp, actor_id, action, resource_type, resource_id,
    status, error_message, details, ip_address, user_agent
"#;

pub struct SqliteAuditLogRepo {
    pool: SqlitePool,
}

impl SqliteAuditLogRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_log(row: &sqlx::sqlite::SqliteRow) -> DbResult<AuditLog> {
        let status: AuditStatus = row
            .get::<String, _>("status")
            .parse()
            .map_err(DbError::Internal)?;
        let details: String = row.get("details");

        Ok(AuditLog {
            id: parse_uuid(row.get("id"))?,
            timestamp: row.get("timestamp"),
            actor_id: parse_optional_uuid(row.get("actor_id"))?,
            action: row.get("action"),
            resource_type: row.get("resource_type"),
            resource_id: row.get("resource_id"),
            status,
            error_message: row.get("error_message"),
            details: serde_json::from_str(&details)?,
            ip_address: row.get("ip_address"),
            user_agent: row.get("user_agent"),
        })
    }
}

#[async_trait]
impl AuditLogRepo for SqliteAuditLogRepo {
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        let id = Uuid::new_v4();
        let now = now();
        let details_json = serde_json::to_string(&input.details)?;

        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, timestamp, actor_id, action, resource_type, resource_id,
                status, error_message, details, ip_address, user_agent
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(now)
        .bind(input.actor_id.map(|id| id.to_string()))
        .bind(&input.action)
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(input.status.as_str())
        .bind(&input.error_message)
        .bind(&details_json)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(AuditLog {
            id,
            timestamp: now,
            actor_id: input.actor_id,
            action: input.action,
            resource_type: input.resource_type,
            resource_id: input.resource_id,
            status: input.status,
            error_message: input.error_message,
            details: input.details,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<AuditLog>> {
        let query = format!("SELECT {} FROM audit_logs WHERE id = ?", AUDIT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_log(&r)).transpose()
    }

    async fn list(&self, query: &AuditLogQuery) -> DbResult<ListResult<AuditLog>> {
        let params = ListParams {
            limit: query.limit,
            offset: query.offset,
            ..Default::default()
        };
        let limit = params.limit();

        let mut conditions: Vec<&str> = Vec::new();
        let mut binds: Vec<String> = Vec::new();

        if let Some(actor_id) = query.actor_id {
            conditions.push("actor_id = ?");
            binds.push(actor_id.to_string());
        }
        if let Some(action) = &query.action {
            // A trailing dot selects a whole event family, e.g. "auth."
            if action.ends_with('.') {
                conditions.push("action LIKE ?");
                binds.push(format!("{}%", action));
            } else {
                conditions.push("action = ?");
                binds.push(action.clone());
            }
        }
        if let Some(resource_type) = &query.resource_type {
            conditions.push("resource_type = ?");
            binds.push(resource_type.clone());
        }
        if let Some(resource_id) = &query.resource_id {
            conditions.push("resource_id = ?");
            binds.push(resource_id.clone());
        }
        if let Some(status) = query.status {
            conditions.push("status = ?");
            binds.push(status.as_str().to_string());
        }

        // Timestamp bounds bind after the string filters.
        if query.from.is_some() {
            conditions.push("timestamp >= ?");
        }
        if query.to.is_some() {
            conditions.push("timestamp < ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM audit_logs {} ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
            AUDIT_COLUMNS, where_clause
        );

        let mut q = sqlx::query(&sql);
        for value in &binds {
            q = q.bind(value);
        }
        if let Some(from) = query.from {
            q = q.bind(from);
        }
        if let Some(to) = query.to {
            q = q.bind(to);
        }

        let rows = q
            .bind(limit + 1)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(Self::parse_log)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(ListResult::from_overfetch(items, limit))
    }
}

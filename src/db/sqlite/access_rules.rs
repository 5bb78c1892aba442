use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{now, parse_optional_uuid, parse_uuid, placeholders};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::AccessRuleRepo,
    },
    models::{AccessRule, AccessRuleQuery, AccessRuleSpec, AccessType, RuleSubject},
};

const RULE_COLUMNS: &str = r#"
    id, role_id, user_id, connection_id, database_pattern, table_pattern,
    access_type, is_allowed, priority, description, created_by, created_at, updated_at
"#;

pub struct SqliteAccessRuleRepo {
    pool: SqlitePool,
}

impl SqliteAccessRuleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_rule(row: &sqlx::sqlite::SqliteRow) -> DbResult<AccessRule> {
        let id = parse_uuid(row.get("id"))?;
        let role_id = parse_optional_uuid(row.get("role_id"))?;
        let user_id = parse_optional_uuid(row.get("user_id"))?;

        let subject = match (role_id, user_id) {
            (Some(role_id), None) => RuleSubject::Role(role_id),
            (None, Some(user_id)) => RuleSubject::User(user_id),
            _ => {
                return Err(DbError::Internal(format!(
                    "Access rule {} does not have exactly one subject",
                    id
                )));
            }
        };

        let access_type: AccessType = row
            .get::<String, _>("access_type")
            .parse()
            .map_err(DbError::Internal)?;
        let is_allowed: i32 = row.get("is_allowed");

        Ok(AccessRule {
            id,
            subject,
            connection_id: parse_optional_uuid(row.get("connection_id"))?,
            database_pattern: row.get("database_pattern"),
            table_pattern: row.get("table_pattern"),
            access_type,
            is_allowed: is_allowed != 0,
            priority: row.get("priority"),
            description: row.get("description"),
            created_by: parse_optional_uuid(row.get("created_by"))?,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn insert_rule(
        conn: &mut sqlx::SqliteConnection,
        subject: RuleSubject,
        spec: &AccessRuleSpec,
        created_by: Option<Uuid>,
    ) -> DbResult<AccessRule> {
        let id = Uuid::new_v4();
        let now = now();

        sqlx::query(
            r#"
            INSERT INTO access_rules (
                id, role_id, user_id, connection_id, database_pattern, table_pattern,
                access_type, is_allowed, priority, description, created_by,
                created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(subject.role_id().map(|id| id.to_string()))
        .bind(subject.user_id().map(|id| id.to_string()))
        .bind(spec.connection_id.map(|id| id.to_string()))
        .bind(&spec.database_pattern)
        .bind(&spec.table_pattern)
        .bind(spec.access_type.as_str())
        .bind(spec.is_allowed as i32)
        .bind(spec.priority)
        .bind(&spec.description)
        .bind(created_by.map(|id| id.to_string()))
        .bind(now)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(AccessRule {
            id,
            subject,
            connection_id: spec.connection_id,
            database_pattern: spec.database_pattern.clone(),
            table_pattern: spec.table_pattern.clone(),
            access_type: spec.access_type,
            is_allowed: spec.is_allowed,
            priority: spec.priority,
            description: spec.description.clone(),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl AccessRuleRepo for SqliteAccessRuleRepo {
    async fn create(
        &self,
        subject: RuleSubject,
        spec: &AccessRuleSpec,
        created_by: Option<Uuid>,
    ) -> DbResult<AccessRule> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_rule(&mut conn, subject, spec, created_by).await
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<AccessRule>> {
        let query = format!("SELECT {} FROM access_rules WHERE id = ?", RULE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_rule(&r)).transpose()
    }

    async fn list(&self, query: &AccessRuleQuery) -> DbResult<Vec<AccessRule>> {
        let mut conditions = Vec::new();
        if query.role_id.is_some() {
            conditions.push("role_id = ?");
        }
        if query.user_id.is_some() {
            conditions.push("user_id = ?");
        }
        if query.connection_id.is_some() {
            conditions.push("connection_id = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM access_rules {} ORDER BY priority DESC, created_at ASC, id ASC",
            RULE_COLUMNS, where_clause
        );

        let mut q = sqlx::query(&sql);
        for id in [query.role_id, query.user_id, query.connection_id]
            .into_iter()
            .flatten()
        {
            q = q.bind(id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_rule).collect()
    }

    async fn update(&self, id: Uuid, spec: &AccessRuleSpec) -> DbResult<AccessRule> {
        let result = sqlx::query(
            r#"
            UPDATE access_rules
            SET connection_id = ?, database_pattern = ?, table_pattern = ?,
                access_type = ?, is_allowed = ?, priority = ?, description = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(spec.connection_id.map(|id| id.to_string()))
        .bind(&spec.database_pattern)
        .bind(&spec.table_pattern)
        .bind(spec.access_type.as_str())
        .bind(spec.is_allowed as i32)
        .bind(spec.priority)
        .bind(&spec.description)
        .bind(now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM access_rules WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn list_applicable(
        &self,
        role_ids: &[Uuid],
        user_id: Uuid,
        connection_id: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>> {
        let subject_clause = if role_ids.is_empty() {
            "user_id = ?".to_string()
        } else {
            format!(
                "(role_id IN ({}) OR user_id = ?)",
                placeholders(role_ids.len())
            )
        };
        let connection_clause = if connection_id.is_some() {
            "(connection_id IS NULL OR connection_id = ?)"
        } else {
            "connection_id IS NULL"
        };

        let sql = format!(
            "SELECT {} FROM access_rules WHERE {} AND {} ORDER BY priority DESC, id ASC",
            RULE_COLUMNS, subject_clause, connection_clause
        );

        let mut q = sqlx::query(&sql);
        for role_id in role_ids {
            q = q.bind(role_id.to_string());
        }
        q = q.bind(user_id.to_string());
        if let Some(connection_id) = connection_id {
            q = q.bind(connection_id.to_string());
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::parse_rule).collect()
    }

    async fn replace_for_subject(
        &self,
        subject: RuleSubject,
        specs: &[AccessRuleSpec],
        created_by: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>> {
        let mut tx = self.pool.begin().await?;

        let delete = match subject {
            RuleSubject::Role(_) => "DELETE FROM access_rules WHERE role_id = ?",
            RuleSubject::User(_) => "DELETE FROM access_rules WHERE user_id = ?",
        };
        let removed = sqlx::query(delete)
            .bind(subject.id().to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut created = Vec::with_capacity(specs.len());
        for spec in specs {
            created.push(Self::insert_rule(&mut *tx, subject, spec, created_by).await?);
        }

        tx.commit().await?;

        tracing::debug!(
            subject = subject.kind(),
            subject_id = %subject.id(),
            removed,
            created = created.len(),
            "Replaced access rules"
        );

        Ok(created)
    }
}

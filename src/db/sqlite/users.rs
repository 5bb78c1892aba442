use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{conflict_on_unique, now, parse_optional_uuid, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{ListParams, ListResult, UserRepo},
    },
    models::{CreateUser, RoleRef, UpdateUser, User, UserCredentials, UserQuery},
};

const USER_COLUMNS: &str = r#"
    u.id, u.username, u.email, u.display_name, u.password_hash, u.is_active,
    u.created_at, u.updated_at, u.last_login_at, u.deleted_at,
    r.id AS role_id, r.name AS role_name
"#;

const USER_FROM: &str = r#"
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN roles r ON r.id = ur.role_id
"#;

pub struct SqliteUserRepo {
    pool: SqlitePool,
}

impl SqliteUserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_user(row: &sqlx::sqlite::SqliteRow) -> DbResult<User> {
        let is_active: i32 = row.get("is_active");
        let role_id = parse_optional_uuid(row.get("role_id"))?;
        let role_name: Option<String> = row.get("role_name");

        Ok(User {
            id: parse_uuid(row.get("id"))?,
            username: row.get("username"),
            email: row.get("email"),
            display_name: row.get("display_name"),
            is_active: is_active != 0,
            role: role_id
                .zip(role_name)
                .map(|(id, name)| RoleRef { id, name }),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            last_login_at: row.get("last_login_at"),
            deleted_at: row.get("deleted_at"),
        })
    }

    async fn role_exists(
        conn: &mut sqlx::SqliteConnection,
        role_id: Uuid,
    ) -> DbResult<bool> {
        let row = sqlx::query("SELECT 1 FROM roles WHERE id = ?")
            .bind(role_id.to_string())
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl UserRepo for SqliteUserRepo {
    async fn create(&self, input: CreateUser, password_hash: &str) -> DbResult<User> {
        let id = Uuid::new_v4();
        let now = now();

        let mut tx = self.pool.begin().await?;

        if let Some(role_id) = input.role_id
            && !Self::role_exists(&mut *tx, role_id).await?
        {
            return Err(DbError::Validation(format!(
                "Role '{}' does not exist",
                role_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO users (
                id, username, email, display_name, password_hash,
                is_active, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.username)
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(password_hash)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            conflict_on_unique(e, || {
                format!("User with username '{}' already exists", input.username)
            })
        })?;

        if let Some(role_id) = input.role_id {
            sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
                .bind(id.to_string())
                .bind(role_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let query = format!(
            "SELECT {} {} WHERE u.id = ? AND u.deleted_at IS NULL",
            USER_COLUMNS, USER_FROM
        );
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_user(&r)).transpose()
    }

    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> DbResult<Option<UserCredentials>> {
        let query = format!(
            "SELECT {} {} WHERE u.username = ? AND u.deleted_at IS NULL",
            USER_COLUMNS, USER_FROM
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: Self::parse_user(&row)?,
                password_hash: row.get("password_hash"),
            })),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &UserQuery, params: ListParams) -> DbResult<ListResult<User>> {
        let limit = params.limit();
        let mut conditions = Vec::new();

        if !query.include_deleted {
            conditions.push("u.deleted_at IS NULL");
        }
        if query.role_id.is_some() {
            conditions.push("ur.role_id = ?");
        }
        if query.is_active.is_some() {
            conditions.push("u.is_active = ?");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} {} {} ORDER BY u.created_at {}, u.id {} LIMIT ? OFFSET ?",
            USER_COLUMNS,
            USER_FROM,
            where_clause,
            params.sort_order.as_sql(),
            params.sort_order.as_sql()
        );

        let mut q = sqlx::query(&sql);
        if let Some(role_id) = query.role_id {
            q = q.bind(role_id.to_string());
        }
        if let Some(is_active) = query.is_active {
            q = q.bind(is_active as i32);
        }

        let rows = q
            .bind(limit + 1)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(Self::parse_user)
            .collect::<DbResult<Vec<_>>>()?;

        Ok(ListResult::from_overfetch(items, limit))
    }

    async fn count(&self) -> DbResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> DbResult<User> {
        let existing = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;

        let email = input.email.unwrap_or(existing.email);
        let display_name = input.display_name.unwrap_or(existing.display_name);
        let is_active = input.is_active.unwrap_or(existing.is_active);

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, display_name = ?, is_active = ?, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(&email)
        .bind(&display_name)
        .bind(is_active as i32)
        .bind(now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> DbResult<User> {
        let now = now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE users SET updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        if let Some(role_id) = role_id
            && !Self::role_exists(&mut *tx, role_id).await?
        {
            return Err(DbError::Validation(format!(
                "Role '{}' does not exist",
                role_id
            )));
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if let Some(role_id) = role_id {
            sqlx::query("INSERT INTO user_roles (user_id, role_id, assigned_at) VALUES (?, ?, ?)")
                .bind(id.to_string())
                .bind(role_id.to_string())
                .bind(now)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    async fn record_login(&self, id: Uuid) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(now())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> DbResult<()> {
        let now = now();
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = ?, is_active = 0, updated_at = ?
            WHERE id = ? AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(&id_str)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM access_rules WHERE user_id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE sessions SET revoked_at = ? WHERE user_id = ? AND revoked_at IS NULL")
            .bind(now)
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

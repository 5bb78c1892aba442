use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{conflict_on_unique, now, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::{RoleRepo, SystemRoleSeed},
    },
    models::{CreateRole, Permission, Role, UpdateRole},
};

const ROLE_COLUMNS: &str = r#"
    id, name, display_name, description, hierarchy_level, is_system, created_at, updated_at
"#;

pub struct SqliteRoleRepo {
    pool: SqlitePool,
}

impl SqliteRoleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_role(row: &sqlx::sqlite::SqliteRow) -> DbResult<Role> {
        let is_system: i32 = row.get("is_system");

        Ok(Role {
            id: parse_uuid(row.get("id"))?,
            name: row.get("name"),
            display_name: row.get("display_name"),
            description: row.get("description"),
            hierarchy_level: row.get("hierarchy_level"),
            is_system: is_system != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    async fn replace_permissions(
        conn: &mut sqlx::SqliteConnection,
        role_id: Uuid,
        permissions: &[impl AsRef<str>],
    ) -> DbResult<()> {
        let role_id = role_id.to_string();

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(&role_id)
            .execute(&mut *conn)
            .await?;

        for permission in permissions {
            sqlx::query(
                "INSERT OR IGNORE INTO role_permissions (role_id, permission_name) VALUES (?, ?)",
            )
            .bind(&role_id)
            .bind(permission.as_ref())
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl RoleRepo for SqliteRoleRepo {
    async fn create(&self, input: CreateRole) -> DbResult<Role> {
        let id = Uuid::new_v4();
        let now = now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO roles (
                id, name, display_name, description, hierarchy_level,
                is_system, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.name)
        .bind(&input.display_name)
        .bind(&input.description)
        .bind(input.hierarchy_level)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("Role '{}' already exists", input.name)))?;

        Self::replace_permissions(&mut *tx, id, &input.permissions).await?;

        tx.commit().await?;

        Ok(Role {
            id,
            name: input.name,
            display_name: input.display_name,
            description: input.description,
            hierarchy_level: input.hierarchy_level,
            is_system: false,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Role>> {
        let query = format!("SELECT {} FROM roles WHERE id = ?", ROLE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_role(&r)).transpose()
    }

    async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>> {
        let query = format!("SELECT {} FROM roles WHERE name = ?", ROLE_COLUMNS);
        let row = sqlx::query(&query)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| Self::parse_role(&r)).transpose()
    }

    async fn list(&self) -> DbResult<Vec<Role>> {
        let query = format!(
            "SELECT {} FROM roles ORDER BY hierarchy_level DESC, name ASC",
            ROLE_COLUMNS
        );
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;

        rows.iter().map(Self::parse_role).collect()
    }

    async fn update(&self, id: Uuid, input: UpdateRole) -> DbResult<Role> {
        let existing = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;

        let display_name = input.display_name.unwrap_or(existing.display_name);
        let description = input.description.unwrap_or(existing.description);
        let hierarchy_level = input.hierarchy_level.unwrap_or(existing.hierarchy_level);
        let now = now();

        let result = sqlx::query(
            r#"
            UPDATE roles
            SET display_name = ?, description = ?, hierarchy_level = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&display_name)
        .bind(&description)
        .bind(hierarchy_level)
        .bind(now)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(Role {
            display_name,
            description,
            hierarchy_level,
            updated_at: now,
            ..existing
        })
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let id_str = id.to_string();
        let mut tx = self.pool.begin().await?;

        for statement in [
            "DELETE FROM access_rules WHERE role_id = ?",
            "DELETE FROM user_roles WHERE role_id = ?",
            "DELETE FROM role_permissions WHERE role_id = ?",
        ] {
            sqlx::query(statement)
                .bind(&id_str)
                .execute(&mut *tx)
                .await?;
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(&id_str)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_permissions(&self, role_id: Uuid) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT permission_name FROM role_permissions WHERE role_id = ? ORDER BY permission_name",
        )
        .bind(role_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("permission_name")).collect())
    }

    async fn set_permissions(&self, role_id: Uuid, permissions: &[String]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE roles SET updated_at = ? WHERE id = ?")
            .bind(now())
            .bind(role_id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Self::replace_permissions(&mut *tx, role_id, permissions).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn permissions_for_user(&self, user_id: Uuid) -> DbResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT rp.permission_name
            FROM users u
            INNER JOIN user_roles ur ON ur.user_id = u.id
            INNER JOIN role_permissions rp ON rp.role_id = ur.role_id
            WHERE u.id = ? AND u.is_active = 1 AND u.deleted_at IS NULL
            ORDER BY rp.permission_name
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("permission_name")).collect())
    }

    async fn user_has_permission(&self, user_id: Uuid, permission: &str) -> DbResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM users u
                INNER JOIN user_roles ur ON ur.user_id = u.id
                INNER JOIN role_permissions rp ON rp.role_id = ur.role_id
                WHERE u.id = ? AND u.is_active = 1 AND u.deleted_at IS NULL
                  AND rp.permission_name = ?
            ) AS granted
            "#,
        )
        .bind(user_id.to_string())
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;

        let granted: i32 = row.get("granted");
        Ok(granted != 0)
    }

    async fn list_catalog(&self) -> DbResult<Vec<Permission>> {
        let rows = sqlx::query(
            "SELECT name, category, description FROM permissions ORDER BY category, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Permission {
                name: r.get("name"),
                category: r.get("category"),
                description: r.get("description"),
            })
            .collect())
    }

    async fn sync_permission_catalog(&self, catalog: &[Permission]) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        for permission in catalog {
            sqlx::query(
                r#"
                INSERT INTO permissions (name, category, description)
                VALUES (?, ?, ?)
                ON CONFLICT(name) DO UPDATE SET
                    category = excluded.category,
                    description = excluded.description
                "#,
            )
            .bind(&permission.name)
            .bind(&permission.category)
            .bind(&permission.description)
            .execute(&mut *tx)
            .await?;
        }

        let current: HashSet<&str> = catalog.iter().map(|p| p.name.as_str()).collect();
        let stored: Vec<String> = sqlx::query("SELECT name FROM permissions")
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(|r| r.get("name"))
            .collect();

        for retired in stored.iter().filter(|name| !current.contains(name.as_str())) {
            tracing::info!(permission = %retired, "Removing retired permission");
            sqlx::query("DELETE FROM role_permissions WHERE permission_name = ?")
                .bind(retired)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM permissions WHERE name = ?")
                .bind(retired)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn seed_system_roles(&self, seeds: &[SystemRoleSeed]) -> DbResult<()> {
        let now = now();
        let mut tx = self.pool.begin().await?;

        for seed in seeds {
            let existing = sqlx::query("SELECT id FROM roles WHERE name = ?")
                .bind(seed.name)
                .fetch_optional(&mut *tx)
                .await?;

            let role_id = match existing {
                Some(row) => {
                    let id = parse_uuid(row.get("id"))?;
                    sqlx::query(
                        r#"
                        UPDATE roles
                        SET display_name = ?, description = ?, hierarchy_level = ?,
                            is_system = 1, updated_at = ?
                        WHERE id = ?
                        "#,
                    )
                    .bind(seed.display_name)
                    .bind(seed.description)
                    .bind(seed.hierarchy_level)
                    .bind(now)
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await?;
                    id
                }
                None => {
                    let id = Uuid::new_v4();
                    sqlx::query(
                        r#"
                        INSERT INTO roles (
                            id, name, display_name, description, hierarchy_level,
                            is_system, created_at, updated_at
                        )
                        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
                        "#,
                    )
                    .bind(id.to_string())
                    .bind(seed.name)
                    .bind(seed.display_name)
                    .bind(seed.description)
                    .bind(seed.hierarchy_level)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    tracing::info!(role = seed.name, "Created system role");
                    id
                }
            };

            Self::replace_permissions(&mut *tx, role_id, &seed.permissions).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    authz::{self, permissions},
    db::{DbError, DbPool},
    models::{CreateRole, PermissionCategory, Role, RoleWithPermissions, UpdateRole, group_by_category},
};

#[derive(Debug, thiserror::Error)]
pub enum RoleServiceError {
    #[error("Role not found")]
    NotFound,

    #[error("System role '{0}' cannot be modified")]
    SystemRole(String),

    #[error("Unknown permissions: {}", .0.join(", "))]
    UnknownPermissions(Vec<String>),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for RoleServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => RoleServiceError::NotFound,
            other => RoleServiceError::Database(other),
        }
    }
}

/// Service layer for roles and their functional permissions
#[derive(Clone)]
pub struct RoleService {
    db: Arc<DbPool>,
}

impl RoleService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Bring the stored catalogue and system roles in line with the code.
    pub async fn sync_catalog(&self) -> Result<(), RoleServiceError> {
        let roles = self.db.roles();
        roles.sync_permission_catalog(&authz::catalog()).await?;
        roles.seed_system_roles(&authz::system_roles()).await?;
        tracing::info!(
            catalog_version = authz::CATALOG_VERSION,
            permissions = authz::PERMISSION_CATALOG.len(),
            "Permission catalogue synchronized"
        );
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Role>, RoleServiceError> {
        Ok(self.db.roles().list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<RoleWithPermissions, RoleServiceError> {
        let role = self.load(id).await?;
        let permissions = self.db.roles().list_permissions(id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    pub async fn create(&self, input: CreateRole) -> Result<RoleWithPermissions, RoleServiceError> {
        check_permissions(&input.permissions)?;
        let role = self.db.roles().create(input).await?;
        let permissions = self.db.roles().list_permissions(role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    pub async fn update(&self, id: Uuid, input: UpdateRole) -> Result<Role, RoleServiceError> {
        self.load_custom(id).await?;
        Ok(self.db.roles().update(id, input).await?)
    }

    /// Delete a custom role. Assignments and access rules on it go with it.
    pub async fn delete(&self, id: Uuid) -> Result<(), RoleServiceError> {
        let role = self.load_custom(id).await?;
        self.db.roles().delete(id).await?;
        tracing::info!(role_id = %id, role = %role.name, "Role deleted");
        Ok(())
    }

    pub async fn set_permissions(
        &self,
        id: Uuid,
        permissions: Vec<String>,
    ) -> Result<RoleWithPermissions, RoleServiceError> {
        check_permissions(&permissions)?;
        let role = self.load_custom(id).await?;

        let mut permissions = permissions;
        permissions.sort();
        permissions.dedup();
        self.db.roles().set_permissions(id, &permissions).await?;

        let permissions = self.db.roles().list_permissions(id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    /// The stored permission catalogue, grouped by category.
    pub async fn catalog(&self) -> Result<Vec<PermissionCategory>, RoleServiceError> {
        Ok(group_by_category(self.db.roles().list_catalog().await?))
    }

    async fn load(&self, id: Uuid) -> Result<Role, RoleServiceError> {
        self.db
            .roles()
            .get_by_id(id)
            .await?
            .ok_or(RoleServiceError::NotFound)
    }

    async fn load_custom(&self, id: Uuid) -> Result<Role, RoleServiceError> {
        let role = self.load(id).await?;
        if role.is_system {
            return Err(RoleServiceError::SystemRole(role.name));
        }
        Ok(role)
    }
}

fn check_permissions(requested: &[String]) -> Result<(), RoleServiceError> {
    let unknown: Vec<String> = requested
        .iter()
        .filter(|p| !permissions::is_known(p))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(RoleServiceError::UnknownPermissions(unknown))
    }
}

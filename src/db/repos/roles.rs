use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateRole, Permission, Role, UpdateRole},
};

/// Seed definition for a system role.
#[derive(Debug, Clone)]
pub struct SystemRoleSeed {
    pub name: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub hierarchy_level: i32,
    pub permissions: Vec<&'static str>,
}

#[async_trait]
pub trait RoleRepo: Send + Sync {
    async fn create(&self, input: CreateRole) -> DbResult<Role>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Role>>;
    async fn get_by_name(&self, name: &str) -> DbResult<Option<Role>>;
    /// All roles ordered by hierarchy level, highest first.
    async fn list(&self) -> DbResult<Vec<Role>>;
    async fn update(&self, id: Uuid, input: UpdateRole) -> DbResult<Role>;
    /// Delete a role. Its permission links, user assignments and access rules cascade.
    async fn delete(&self, id: Uuid) -> DbResult<()>;

    /// Permission names granted to a role.
    async fn list_permissions(&self, role_id: Uuid) -> DbResult<Vec<String>>;
    /// Replace a role's permission set in one transaction.
    async fn set_permissions(&self, role_id: Uuid, permissions: &[String]) -> DbResult<()>;
    /// Authoritative permission set for an active, live user via user → role → permissions.
    async fn permissions_for_user(&self, user_id: Uuid) -> DbResult<Vec<String>>;
    /// Whether a single permission is granted to an active, live user.
    async fn user_has_permission(&self, user_id: Uuid, permission: &str) -> DbResult<bool>;

    /// The permission catalogue as stored.
    async fn list_catalog(&self) -> DbResult<Vec<Permission>>;
    /// Upsert the catalogue and remove retired permission names (and their grants).
    async fn sync_permission_catalog(&self, catalog: &[Permission]) -> DbResult<()>;
    /// Create missing system roles and reset their permission sets to the seed.
    async fn seed_system_roles(&self, seeds: &[SystemRoleSeed]) -> DbResult<()>;
}

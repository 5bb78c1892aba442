//! In-memory repositories that count store calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::{
        DbError, DbResult,
        repos::{AccessRuleRepo, RoleRepo, SystemRoleSeed},
    },
    models::{
        AccessRule, AccessRuleQuery, AccessRuleSpec, AccessType, CreateRole, Permission, Role,
        RuleSubject, UpdateRole,
    },
};

fn unavailable() -> DbError {
    DbError::Internal("store offline".to_string())
}

/// Serves one fixed permission set for every user.
pub struct MockRoleRepo {
    permissions: Vec<String>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockRoleRepo {
    pub fn with_permissions(permissions: &[&str]) -> Self {
        Self {
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_permissions(&[])
        }
    }
}

#[async_trait]
impl RoleRepo for MockRoleRepo {
    async fn create(&self, _input: CreateRole) -> DbResult<Role> {
        unimplemented!("not used by resolver tests")
    }

    async fn get_by_id(&self, _id: Uuid) -> DbResult<Option<Role>> {
        unimplemented!("not used by resolver tests")
    }

    async fn get_by_name(&self, _name: &str) -> DbResult<Option<Role>> {
        unimplemented!("not used by resolver tests")
    }

    async fn list(&self) -> DbResult<Vec<Role>> {
        unimplemented!("not used by resolver tests")
    }

    async fn update(&self, _id: Uuid, _input: UpdateRole) -> DbResult<Role> {
        unimplemented!("not used by resolver tests")
    }

    async fn delete(&self, _id: Uuid) -> DbResult<()> {
        unimplemented!("not used by resolver tests")
    }

    async fn list_permissions(&self, _role_id: Uuid) -> DbResult<Vec<String>> {
        unimplemented!("not used by resolver tests")
    }

    async fn set_permissions(&self, _role_id: Uuid, _permissions: &[String]) -> DbResult<()> {
        unimplemented!("not used by resolver tests")
    }

    async fn permissions_for_user(&self, _user_id: Uuid) -> DbResult<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unavailable());
        }
        Ok(self.permissions.clone())
    }

    async fn user_has_permission(&self, _user_id: Uuid, permission: &str) -> DbResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unavailable());
        }
        Ok(self.permissions.iter().any(|p| p == permission))
    }

    async fn list_catalog(&self) -> DbResult<Vec<Permission>> {
        unimplemented!("not used by resolver tests")
    }

    async fn sync_permission_catalog(&self, _catalog: &[Permission]) -> DbResult<()> {
        unimplemented!("not used by resolver tests")
    }

    async fn seed_system_roles(&self, _seeds: &[SystemRoleSeed]) -> DbResult<()> {
        unimplemented!("not used by resolver tests")
    }
}

/// Serves a fixed rule list, applying only the subject and connection filters
/// the real store applies.
pub struct MockRuleRepo {
    rules: Vec<AccessRule>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockRuleRepo {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self {
            rules,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl AccessRuleRepo for MockRuleRepo {
    async fn create(
        &self,
        _subject: RuleSubject,
        _spec: &AccessRuleSpec,
        _created_by: Option<Uuid>,
    ) -> DbResult<AccessRule> {
        unimplemented!("not used by evaluator tests")
    }

    async fn get_by_id(&self, _id: Uuid) -> DbResult<Option<AccessRule>> {
        unimplemented!("not used by evaluator tests")
    }

    async fn list(&self, _query: &AccessRuleQuery) -> DbResult<Vec<AccessRule>> {
        unimplemented!("not used by evaluator tests")
    }

    async fn update(&self, _id: Uuid, _spec: &AccessRuleSpec) -> DbResult<AccessRule> {
        unimplemented!("not used by evaluator tests")
    }

    async fn delete(&self, _id: Uuid) -> DbResult<()> {
        unimplemented!("not used by evaluator tests")
    }

    async fn list_applicable(
        &self,
        role_ids: &[Uuid],
        user_id: Uuid,
        connection_id: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(unavailable());
        }
        Ok(self
            .rules
            .iter()
            .filter(|r| match r.subject {
                RuleSubject::Role(id) => role_ids.contains(&id),
                RuleSubject::User(id) => id == user_id,
            })
            .filter(|r| r.connection_id.is_none() || r.connection_id == connection_id)
            .cloned()
            .collect())
    }

    async fn replace_for_subject(
        &self,
        _subject: RuleSubject,
        _specs: &[AccessRuleSpec],
        _created_by: Option<Uuid>,
    ) -> DbResult<Vec<AccessRule>> {
        unimplemented!("not used by evaluator tests")
    }
}

/// Build a rule with fresh timestamps.
pub fn rule(
    subject: RuleSubject,
    database: &str,
    table: &str,
    access_type: AccessType,
    is_allowed: bool,
    priority: i32,
) -> AccessRule {
    let now = chrono::Utc::now();
    AccessRule {
        id: Uuid::new_v4(),
        subject,
        connection_id: None,
        database_pattern: database.to_string(),
        table_pattern: table.to_string(),
        access_type,
        is_allowed,
        priority,
        description: None,
        created_by: None,
        created_at: now,
        updated_at: now,
    }
}

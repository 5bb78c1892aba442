use std::sync::Arc;

use super::AuthzError;
use crate::{auth::Principal, db::repos::RoleRepo};

/// Answers functional permission checks.
///
/// Fast path: membership in the token snapshot allows without a store call.
/// Slow path: on a snapshot miss, the store is asked via user → role →
/// role_permissions, which picks up grants made after the token was issued.
/// Absence from the snapshot alone never denies.
#[derive(Clone)]
pub struct PermissionResolver {
    roles: Arc<dyn RoleRepo>,
}

impl PermissionResolver {
    pub fn new(roles: Arc<dyn RoleRepo>) -> Self {
        Self { roles }
    }

    pub async fn has_permission(
        &self,
        principal: &Principal,
        permission: &str,
    ) -> Result<bool, AuthzError> {
        if principal.has_cached_permission(permission) {
            return Ok(true);
        }

        let granted = self
            .roles
            .user_has_permission(principal.user_id, permission)
            .await
            .map_err(AuthzError::store_unavailable)?;

        if granted {
            tracing::debug!(
                user_id = %principal.user_id,
                permission,
                "Permission granted by store after snapshot miss"
            );
        }
        Ok(granted)
    }

    pub async fn has_any(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> Result<bool, AuthzError> {
        if permissions.iter().any(|p| principal.has_cached_permission(p)) {
            return Ok(true);
        }
        if permissions.is_empty() {
            return Ok(false);
        }

        let current = self.load(principal).await?;
        Ok(permissions
            .iter()
            .any(|p| current.iter().any(|held| held == p)))
    }

    pub async fn has_all(
        &self,
        principal: &Principal,
        permissions: &[&str],
    ) -> Result<bool, AuthzError> {
        let missing: Vec<&str> = permissions
            .iter()
            .copied()
            .filter(|p| !principal.has_cached_permission(p))
            .collect();
        if missing.is_empty() {
            return Ok(true);
        }

        let current = self.load(principal).await?;
        Ok(missing
            .iter()
            .all(|p| current.iter().any(|held| held == p)))
    }

    /// Fails with [`AuthzError::PermissionDenied`] naming the permission.
    pub async fn require(&self, principal: &Principal, permission: &str) -> Result<(), AuthzError> {
        if self.has_permission(principal, permission).await? {
            Ok(())
        } else {
            tracing::info!(
                user_id = %principal.user_id,
                permission,
                "Permission denied"
            );
            Err(AuthzError::permission_denied(permission))
        }
    }

    async fn load(&self, principal: &Principal) -> Result<Vec<String>, AuthzError> {
        self.roles
            .permissions_for_user(principal.user_id)
            .await
            .map_err(AuthzError::store_unavailable)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use uuid::Uuid;

    use super::*;
    use crate::{auth::test_support::principal, authz::test_support::MockRoleRepo};

    fn resolver(repo: &Arc<MockRoleRepo>) -> PermissionResolver {
        PermissionResolver::new(repo.clone())
    }

    #[tokio::test]
    async fn test_fast_path_skips_store() {
        let repo = Arc::new(MockRoleRepo::with_permissions(&[]));
        let principal = principal(&[(Uuid::new_v4(), "analyst")], &["query:execute"]);

        assert!(
            resolver(&repo)
                .has_permission(&principal, "query:execute")
                .await
                .unwrap()
        );
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_slow_path_picks_up_new_grant() {
        // Granted to the role after the token was issued
        let repo = Arc::new(MockRoleRepo::with_permissions(&["query:execute", "query:ddl"]));
        let principal = principal(&[(Uuid::new_v4(), "analyst")], &["query:execute"]);

        assert!(
            resolver(&repo)
                .has_permission(&principal, "query:ddl")
                .await
                .unwrap()
        );
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_everywhere_is_denied() {
        let repo = Arc::new(MockRoleRepo::with_permissions(&["query:execute"]));
        let principal = principal(&[(Uuid::new_v4(), "analyst")], &["query:execute"]);
        let resolver = resolver(&repo);

        assert!(!resolver.has_permission(&principal, "users:delete").await.unwrap());
        let err = resolver.require(&principal, "users:delete").await.unwrap_err();
        assert!(matches!(
            err,
            AuthzError::PermissionDenied { ref permission } if permission == "users:delete"
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_an_allow() {
        let repo = Arc::new(MockRoleRepo::failing());
        let principal = principal(&[(Uuid::new_v4(), "analyst")], &[]);
        let resolver = resolver(&repo);

        let result = resolver.has_permission(&principal, "query:ddl").await;
        assert!(matches!(result, Err(AuthzError::StoreUnavailable(_))));
        assert!(resolver.require(&principal, "query:ddl").await.is_err());
    }

    #[tokio::test]
    async fn test_has_any_and_has_all() {
        let repo = Arc::new(MockRoleRepo::with_permissions(&["users:view", "roles:view"]));
        let principal = principal(&[(Uuid::new_v4(), "analyst")], &["users:view"]);
        let resolver = resolver(&repo);

        assert!(
            resolver
                .has_any(&principal, &["users:delete", "users:view"])
                .await
                .unwrap()
        );
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);

        assert!(
            resolver
                .has_all(&principal, &["users:view", "roles:view"])
                .await
                .unwrap()
        );
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);

        assert!(
            !resolver
                .has_all(&principal, &["users:view", "users:delete"])
                .await
                .unwrap()
        );
        assert!(!resolver.has_any(&principal, &["users:delete"]).await.unwrap());
        assert!(!resolver.has_any(&principal, &[]).await.unwrap());
        assert!(resolver.has_all(&principal, &[]).await.unwrap());
    }
}

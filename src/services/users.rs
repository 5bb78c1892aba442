use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::password::{self, PasswordHashError},
    config::BootstrapAdminConfig,
    db::{DbError, DbPool, ListParams, ListResult},
    models::{CreateUser, UpdateUser, User, UserQuery},
};

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("User not found")]
    NotFound,

    /// An administrator tried to delete or deactivate their own account
    #[error("{0}")]
    SelfModification(&'static str),

    #[error(transparent)]
    PasswordHash(#[from] PasswordHashError),

    #[error("Database error: {0}")]
    Database(DbError),
}

impl From<DbError> for UserServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => UserServiceError::NotFound,
            other => UserServiceError::Database(other),
        }
    }
}

/// Service layer for user operations
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Create a new user, hashing the supplied password
    pub async fn create(&self, input: CreateUser) -> Result<User, UserServiceError> {
        let hash = hash_off_thread(input.password.clone()).await?;
        Ok(self.db.users().create(input, &hash).await?)
    }

    /// Get a live user by ID
    pub async fn get_by_id(&self, id: Uuid) -> Result<User, UserServiceError> {
        self.db
            .users()
            .get_by_id(id)
            .await?
            .ok_or(UserServiceError::NotFound)
    }

    /// List users with pagination
    pub async fn list(
        &self,
        query: &UserQuery,
        params: ListParams,
    ) -> Result<ListResult<User>, UserServiceError> {
        Ok(self.db.users().list(query, params).await?)
    }

    /// Update profile fields or the active flag.
    ///
    /// Deactivating a user revokes their sessions.
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
        actor_id: Uuid,
    ) -> Result<User, UserServiceError> {
        let deactivating = input.is_active == Some(false);
        if deactivating && id == actor_id {
            return Err(UserServiceError::SelfModification(
                "You cannot deactivate your own account",
            ));
        }

        let user = self.db.users().update(id, input).await?;
        if deactivating {
            self.revoke_sessions(id, "deactivated").await?;
        }
        Ok(user)
    }

    /// Replace the user's role. A change revokes the user's sessions so the
    /// next token carries the new role.
    pub async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> Result<User, UserServiceError> {
        let previous = self.get_by_id(id).await?.role.map(|r| r.id);
        let user = self.db.users().set_role(id, role_id).await?;

        if previous != role_id {
            self.revoke_sessions(id, "role_changed").await?;
        }
        Ok(user)
    }

    pub async fn reset_password(&self, id: Uuid, password: String) -> Result<(), UserServiceError> {
        // Surface NotFound before spending time on the hash
        self.get_by_id(id).await?;
        let hash = hash_off_thread(password).await?;
        self.db.users().set_password_hash(id, &hash).await?;
        self.revoke_sessions(id, "password_reset").await?;
        Ok(())
    }

    /// Soft-delete a user. Role assignment, personal rules and sessions go with it.
    pub async fn delete(&self, id: Uuid, actor_id: Uuid) -> Result<(), UserServiceError> {
        if id == actor_id {
            return Err(UserServiceError::SelfModification(
                "You cannot delete your own account",
            ));
        }
        self.db.users().soft_delete(id).await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Create the configured administrator if the store has no users yet.
    pub async fn bootstrap_admin(
        &self,
        config: &BootstrapAdminConfig,
    ) -> Result<Option<User>, UserServiceError> {
        if self.db.users().count().await? > 0 {
            tracing::debug!("Users exist, skipping bootstrap administrator");
            return Ok(None);
        }

        let admin_role = self
            .db
            .roles()
            .get_by_name("admin")
            .await?
            .ok_or_else(|| {
                UserServiceError::Database(DbError::Internal(
                    "admin system role has not been seeded".to_string(),
                ))
            })?;

        let user = self
            .create(CreateUser {
                username: config.username.clone(),
                email: config.email.clone(),
                display_name: Some("Administrator".to_string()),
                password: config.password.clone(),
                role_id: Some(admin_role.id),
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "Bootstrap administrator created");
        Ok(Some(user))
    }

    async fn revoke_sessions(&self, id: Uuid, reason: &str) -> Result<(), UserServiceError> {
        let revoked = self.db.sessions().revoke_all_for_user(id).await?;
        if revoked > 0 {
            tracing::info!(user_id = %id, revoked, reason, "Revoked user sessions");
        }
        Ok(())
    }
}

/// Argon2 is deliberately slow; keep it off the async workers.
pub(crate) async fn hash_off_thread(password: String) -> Result<String, UserServiceError> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| UserServiceError::Database(DbError::Internal(e.to_string())))?
        .map_err(UserServiceError::from)
}

use async_trait::async_trait;
use uuid::Uuid;

use super::{ListParams, ListResult};
use crate::{
    db::error::DbResult,
    models::{CreateUser, UpdateUser, User, UserCredentials, UserQuery},
};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user and, if `input.role_id` is set, assign the role in the same transaction.
    async fn create(&self, input: CreateUser, password_hash: &str) -> DbResult<User>;
    /// Get a live (not soft-deleted) user.
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>>;
    /// Look up a live user by username, including the password hash.
    async fn get_credentials_by_username(
        &self,
        username: &str,
    ) -> DbResult<Option<UserCredentials>>;
    async fn list(&self, query: &UserQuery, params: ListParams) -> DbResult<ListResult<User>>;
    /// Count live users.
    async fn count(&self) -> DbResult<i64>;
    async fn update(&self, id: Uuid, input: UpdateUser) -> DbResult<User>;
    /// Replace the user's role assignment. `None` clears it.
    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> DbResult<User>;
    async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> DbResult<()>;
    async fn record_login(&self, id: Uuid) -> DbResult<()>;
    /// Soft-delete a user. In one transaction this also removes the role
    /// assignment and personal access rules and revokes every session.
    async fn soft_delete(&self, id: Uuid) -> DbResult<()>;
}

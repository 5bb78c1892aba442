use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateSession, Session},
};

#[async_trait]
pub trait SessionRepo: Send + Sync {
    async fn create(&self, input: CreateSession) -> DbResult<Session>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Session>>;
    async fn get_by_token_hash(&self, token_hash: &str) -> DbResult<Option<Session>>;
    /// Swap the refresh token hash of a live session, returning false if the
    /// session was already revoked or the old hash no longer matches.
    async fn rotate(&self, id: Uuid, old_hash: &str, new_hash: &str) -> DbResult<bool>;
    async fn revoke(&self, id: Uuid) -> DbResult<()>;
    /// Revoke every live session of a user, returning the number revoked.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> DbResult<u64>;
}

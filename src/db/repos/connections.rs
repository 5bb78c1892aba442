use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{Connection, CreateConnection},
};

#[async_trait]
pub trait ConnectionRepo: Send + Sync {
    async fn create(&self, input: CreateConnection) -> DbResult<Connection>;
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Connection>>;
    async fn list(&self) -> DbResult<Vec<Connection>>;
    /// Delete a connection and every access rule scoped to it.
    async fn delete(&self, id: Uuid) -> DbResult<()>;
}

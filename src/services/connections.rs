use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{DbPool, DbResult},
    models::{Connection, CreateConnection},
};

/// Service layer for the storage cluster registry
#[derive(Clone)]
pub struct ConnectionService {
    db: Arc<DbPool>,
}

impl ConnectionService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateConnection) -> DbResult<Connection> {
        self.db.connections().create(input).await
    }

    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<Connection>> {
        self.db.connections().get_by_id(id).await
    }

    pub async fn list(&self) -> DbResult<Vec<Connection>> {
        self.db.connections().list().await
    }

    /// Remove a connection. Rules scoped to it are deleted with it.
    pub async fn delete(&self, id: Uuid) -> DbResult<()> {
        self.db.connections().delete(id).await?;
        tracing::info!(connection_id = %id, "Connection deleted");
        Ok(())
    }
}

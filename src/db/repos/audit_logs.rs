use async_trait::async_trait;
use uuid::Uuid;

use super::ListResult;
use crate::{
    db::error::DbResult,
    models::{AuditLog, AuditLogQuery, CreateAuditLog},
};

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    /// Create a new audit log entry
    async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog>;

    /// Get an audit log entry by ID
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<AuditLog>>;

    /// List audit logs, newest first, with optional filtering and offset pagination
    async fn list(&self, query: &AuditLogQuery) -> DbResult<ListResult<AuditLog>>;
}

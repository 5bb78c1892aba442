use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::{
    db::{DbPool, DbResult, repos::ListResult},
    middleware::ClientInfo,
    models::{AuditLog, AuditLogQuery, AuditStatus, CreateAuditLog},
};

/// Audit action names.
pub mod actions {
    pub const LOGIN: &str = "auth.login";
    pub const LOGIN_FAILED: &str = "auth.login_failed";
    /// Bearer token failed verification
    pub const TOKEN_REJECTED: &str = "auth.token_rejected";
    pub const REFRESH: &str = "auth.refresh";
    pub const REFRESH_FAILED: &str = "auth.refresh_failed";
    pub const LOGOUT: &str = "auth.logout";

    pub const PERMISSION_DENIED: &str = "authz.permission_denied";
    pub const PERMISSION_ALLOWED: &str = "authz.permission_allowed";
    pub const RESOURCE_DENIED: &str = "authz.resource_denied";
    pub const RESOURCE_ALLOWED: &str = "authz.resource_allowed";

    pub const USER_CREATE: &str = "user.create";
    pub const USER_UPDATE: &str = "user.update";
    pub const USER_DELETE: &str = "user.delete";
    pub const USER_SET_ROLE: &str = "user.set_role";
    pub const USER_RESET_PASSWORD: &str = "user.reset_password";

    pub const ROLE_CREATE: &str = "role.create";
    pub const ROLE_UPDATE: &str = "role.update";
    pub const ROLE_DELETE: &str = "role.delete";
    pub const ROLE_SET_PERMISSIONS: &str = "role.set_permissions";

    pub const ACCESS_RULE_CREATE: &str = "access_rule.create";
    pub const ACCESS_RULE_UPDATE: &str = "access_rule.update";
    pub const ACCESS_RULE_DELETE: &str = "access_rule.delete";
    pub const ACCESS_RULE_REPLACE: &str = "access_rule.replace";

    pub const CONNECTION_CREATE: &str = "connection.create";
    pub const CONNECTION_DELETE: &str = "connection.delete";
}

/// Builder for one audit entry.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    entry: CreateAuditLog,
}

impl AuditEvent {
    pub fn success(action: &str) -> Self {
        Self::new(action, AuditStatus::Success)
    }

    pub fn failure(action: &str) -> Self {
        Self::new(action, AuditStatus::Failure)
    }

    fn new(action: &str, status: AuditStatus) -> Self {
        Self {
            entry: CreateAuditLog {
                actor_id: None,
                action: action.to_string(),
                resource_type: None,
                resource_id: None,
                status,
                error_message: None,
                details: JsonValue::Object(Default::default()),
                ip_address: None,
                user_agent: None,
            },
        }
    }

    pub fn actor(mut self, actor_id: Uuid) -> Self {
        self.entry.actor_id = Some(actor_id);
        self
    }

    pub fn resource(mut self, resource_type: &str, resource_id: impl ToString) -> Self {
        self.entry.resource_type = Some(resource_type.to_string());
        self.entry.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.entry.error_message = Some(message.into());
        self
    }

    pub fn details(mut self, details: JsonValue) -> Self {
        self.entry.details = details;
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.entry.ip_address = client.ip_address.clone();
        self.entry.user_agent = client.user_agent.clone();
        self
    }

    pub fn into_entry(self) -> CreateAuditLog {
        self.entry
    }
}

/// Service layer for audit log operations
#[derive(Clone)]
pub struct AuditLogService {
    db: Arc<DbPool>,
    task_tracker: TaskTracker,
}

impl AuditLogService {
    pub fn new(db: Arc<DbPool>, task_tracker: TaskTracker) -> Self {
        Self { db, task_tracker }
    }

    /// Create a new audit log entry
    pub async fn create(&self, input: CreateAuditLog) -> DbResult<AuditLog> {
        self.db.audit_logs().create(input).await
    }

    /// Write an entry in the background. Failures are logged and dropped.
    ///
    /// The task is tracked so shutdown can wait for pending writes.
    pub fn record(&self, event: AuditEvent) {
        let service = self.clone();
        let entry = event.into_entry();
        self.task_tracker.spawn(async move {
            let action = entry.action.clone();
            if let Err(e) = service.create(entry).await {
                tracing::warn!(action = %action, error = %e, "Failed to write audit log");
            }
        });
    }

    /// Get an audit log entry by ID
    pub async fn get_by_id(&self, id: Uuid) -> DbResult<Option<AuditLog>> {
        self.db.audit_logs().get_by_id(id).await
    }

    /// List audit logs with optional filtering
    pub async fn list(&self, query: AuditLogQuery) -> DbResult<ListResult<AuditLog>> {
        self.db.audit_logs().list(&query).await
    }
}

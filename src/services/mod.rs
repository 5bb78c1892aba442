mod access_rules;
pub mod audit_logs;
mod connections;
mod roles;
mod sessions;
mod users;

use std::sync::Arc;

pub use access_rules::{AccessRuleError, AccessRuleService};
pub use audit_logs::{AuditEvent, AuditLogService, actions};
pub use connections::ConnectionService;
pub use roles::{RoleService, RoleServiceError};
pub use sessions::{IssuedSession, SessionError, SessionService};
use tokio_util::task::TaskTracker;
pub use users::{UserService, UserServiceError};

use crate::{
    auth::TokenSigner,
    config::{ConfigError, TokenConfig},
    db::DbPool,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub roles: RoleService,
    pub access_rules: AccessRuleService,
    pub connections: ConnectionService,
    pub sessions: SessionService,
    pub audit_logs: AuditLogService,
}

impl Services {
    pub fn new(
        db: Arc<DbPool>,
        signer: Arc<TokenSigner>,
        tokens: &TokenConfig,
        task_tracker: TaskTracker,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            users: UserService::new(db.clone()),
            roles: RoleService::new(db.clone()),
            access_rules: AccessRuleService::new(db.clone()),
            connections: ConnectionService::new(db.clone()),
            sessions: SessionService::new(db.clone(), signer, tokens.refresh_ttl()?),
            audit_logs: AuditLogService::new(db, task_tracker),
        })
    }
}

//! Per-request authorization context.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use uuid::Uuid;

use super::ClientInfo;
use crate::{
    AppState,
    auth::{AuthError, Principal},
    authz::{AccessDecision, AuthzError, PermissionResolver, ResourceAccessEvaluator},
    config::AuthzAuditConfig,
    models::{AccessType, ResourceRef},
    services::{AuditEvent, AuditLogService, actions},
};

/// Authorization context extracted from request.
///
/// Handlers call [`AuthzContext::require`] for functional permissions and
/// [`AuthzContext::require_resource`] for data access. Both write audit
/// entries according to [`AuthzAuditConfig`].
#[derive(Clone)]
pub struct AuthzContext {
    pub principal: Arc<Principal>,
    resolver: PermissionResolver,
    evaluator: ResourceAccessEvaluator,
    audit_service: AuditLogService,
    client: ClientInfo,
    audit_config: AuthzAuditConfig,
}

impl AuthzContext {
    pub fn new(
        principal: Principal,
        resolver: PermissionResolver,
        evaluator: ResourceAccessEvaluator,
        audit_service: AuditLogService,
        client: ClientInfo,
        audit_config: AuthzAuditConfig,
    ) -> Self {
        Self {
            principal: Arc::new(principal),
            resolver,
            evaluator,
            audit_service,
            client,
            audit_config,
        }
    }

    pub fn actor_id(&self) -> Uuid {
        self.principal.user_id
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    /// Audit event attributed to the caller.
    pub fn audit_event(&self, event: AuditEvent) -> AuditEvent {
        event.actor(self.actor_id()).client(&self.client)
    }

    /// Record an audit event attributed to the caller.
    pub fn record(&self, event: AuditEvent) {
        self.audit_service.record(self.audit_event(event));
    }

    /// Check a functional permission and fail with
    /// [`AuthzError::PermissionDenied`] if it is not held.
    pub async fn require(&self, permission: &str) -> Result<(), AuthzError> {
        match self.resolver.require(&self.principal, permission).await {
            Ok(()) => {
                if self.audit_config.log_allowed {
                    self.record(
                        AuditEvent::success(actions::PERMISSION_ALLOWED)
                            .resource("permission", permission),
                    );
                }
                Ok(())
            }
            Err(err) => {
                if self.audit_config.log_denied {
                    self.record(
                        AuditEvent::failure(actions::PERMISSION_DENIED)
                            .resource("permission", permission)
                            .error(err.to_string()),
                    );
                }
                Err(err)
            }
        }
    }

    /// Evaluate data access without failing on a deny.
    pub async fn check_resource(
        &self,
        resource: &ResourceRef,
        access: AccessType,
    ) -> Result<AccessDecision, AuthzError> {
        let result = self
            .evaluator
            .evaluate(&self.principal, resource, access)
            .await;

        match &result {
            Ok(decision) if decision.is_allowed() => {
                if self.audit_config.log_allowed {
                    self.record(
                        resource_event(AuditEvent::success(actions::RESOURCE_ALLOWED), resource)
                            .details(resource_details(resource, access, Some(decision))),
                    );
                }
            }
            Ok(decision) => {
                tracing::info!(
                    user_id = %self.principal.user_id,
                    resource = %resource.display_name(),
                    access = %access,
                    rule_id = ?decision.rule_id,
                    "Resource access denied"
                );
                if self.audit_config.log_denied {
                    self.record(
                        resource_event(AuditEvent::failure(actions::RESOURCE_DENIED), resource)
                            .details(resource_details(resource, access, Some(decision))),
                    );
                }
            }
            Err(err) => {
                if self.audit_config.log_denied {
                    self.record(
                        resource_event(AuditEvent::failure(actions::RESOURCE_DENIED), resource)
                            .error(err.to_string())
                            .details(resource_details(resource, access, None)),
                    );
                }
            }
        }

        result
    }

    /// Evaluate data access and fail with [`AuthzError::ResourceAccessDenied`]
    /// on a deny.
    pub async fn require_resource(
        &self,
        resource: &ResourceRef,
        access: AccessType,
    ) -> Result<AccessDecision, AuthzError> {
        let decision = self.check_resource(resource, access).await?;
        if decision.is_allowed() {
            Ok(decision)
        } else {
            Err(AuthzError::ResourceAccessDenied {
                resource: resource.display_name(),
                access,
            })
        }
    }

    pub async fn filter_databases(
        &self,
        connection_id: Option<Uuid>,
        databases: Vec<String>,
    ) -> Result<Vec<String>, AuthzError> {
        self.evaluator
            .filter_databases(&self.principal, connection_id, databases)
            .await
    }

    pub async fn filter_tables(
        &self,
        connection_id: Option<Uuid>,
        database: &str,
        tables: Vec<String>,
    ) -> Result<Vec<String>, AuthzError> {
        self.evaluator
            .filter_tables(&self.principal, connection_id, database, tables)
            .await
    }
}

fn resource_event(event: AuditEvent, resource: &ResourceRef) -> AuditEvent {
    let kind = if resource.table.is_some() {
        "table"
    } else {
        "database"
    };
    event.resource(kind, resource.display_name())
}

fn resource_details(
    resource: &ResourceRef,
    access: AccessType,
    decision: Option<&AccessDecision>,
) -> serde_json::Value {
    json!({
        "access_type": access,
        "connection_id": resource.connection_id,
        "rule_id": decision.and_then(|d| d.rule_id),
        "reason": decision.map(|d| d.reason),
    })
}

/// Builds the [`AuthzContext`] for a request that passed
/// [`auth_middleware`](super::auth_middleware).
pub async fn authz_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(principal) = req.extensions().get::<Principal>().cloned() else {
        return Err(AuthError::MissingCredentials);
    };
    let client = req
        .extensions()
        .get::<ClientInfo>()
        .cloned()
        .unwrap_or_else(|| ClientInfo::from_request(&req));

    let context = AuthzContext::new(
        principal,
        state.resolver.clone(),
        state.evaluator.clone(),
        state.services.audit_logs.clone(),
        client,
        state.config.auth.audit.clone(),
    );
    req.extensions_mut().insert(context);

    Ok(next.run(req).await)
}

#[cfg(all(test, feature = "database-sqlite"))]
mod tests {
    use tokio_util::task::TaskTracker;

    use super::*;
    use crate::{
        auth::test_support::principal,
        authz::test_support::{MockRoleRepo, MockRuleRepo, rule},
        db::tests::harness::create_seeded_db,
        models::{AuditLogQuery, AuditStatus, RuleSubject},
    };

    async fn context(
        principal: Principal,
        rules: Vec<crate::models::AccessRule>,
        audit_config: AuthzAuditConfig,
    ) -> (AuthzContext, AuditLogService, TaskTracker) {
        let tracker = TaskTracker::new();
        let audit = AuditLogService::new(create_seeded_db().await, tracker.clone());
        let ctx = AuthzContext::new(
            principal,
            PermissionResolver::new(Arc::new(MockRoleRepo::with_permissions(&[]))),
            ResourceAccessEvaluator::new(Arc::new(MockRuleRepo::new(rules)), vec!["admin".into()]),
            audit.clone(),
            ClientInfo::default(),
            audit_config,
        );
        (ctx, audit, tracker)
    }

    async fn drain(audit: &AuditLogService, tracker: &TaskTracker) -> Vec<crate::models::AuditLog> {
        tracker.close();
        tracker.wait().await;
        audit.list(AuditLogQuery::default()).await.unwrap().items
    }

    #[tokio::test]
    async fn test_denied_permission_is_audited() {
        let p = principal(&[(Uuid::new_v4(), "analyst")], &["query:execute"]);
        let actor = p.user_id;
        let (ctx, audit, tracker) = context(p, vec![], AuthzAuditConfig::default()).await;

        ctx.require("query:execute").await.unwrap();
        let err = ctx.require("users:delete").await.unwrap_err();
        assert!(matches!(err, AuthzError::PermissionDenied { .. }));

        let logs = drain(&audit, &tracker).await;
        assert_eq!(logs.len(), 1, "allowed decisions are not logged by default");
        assert_eq!(logs[0].action, actions::PERMISSION_DENIED);
        assert_eq!(logs[0].actor_id, Some(actor));
        assert_eq!(logs[0].resource_id.as_deref(), Some("users:delete"));
    }

    #[tokio::test]
    async fn test_resource_decisions_follow_audit_config() {
        let role = Uuid::new_v4();
        let rules = vec![rule(RuleSubject::Role(role), "sales", "*", AccessType::Read, true, 0)];
        let config = AuthzAuditConfig {
            log_allowed: true,
            log_denied: true,
        };
        let (ctx, audit, tracker) = context(principal(&[(role, "analyst")], &[]), rules, config).await;

        let allowed = ResourceRef::table("sales", "orders");
        assert!(ctx.require_resource(&allowed, AccessType::Read).await.is_ok());

        let denied = ResourceRef::table("finance", "ledger");
        let err = ctx
            .require_resource(&denied, AccessType::Read)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "read access denied on 'finance.ledger'");

        let logs = drain(&audit, &tracker).await;
        assert_eq!(logs.len(), 2);
        let denied_log = logs
            .iter()
            .find(|l| l.action == actions::RESOURCE_DENIED)
            .unwrap();
        assert_eq!(denied_log.status, AuditStatus::Failure);
        assert_eq!(denied_log.resource_type.as_deref(), Some("table"));
        assert_eq!(denied_log.details["reason"], "no_matching_rule");
        assert!(logs.iter().any(|l| l.action == actions::RESOURCE_ALLOWED));
    }

    #[tokio::test]
    async fn test_check_resource_does_not_fail_on_deny() {
        let (ctx, _audit, _tracker) = context(
            principal(&[(Uuid::new_v4(), "viewer")], &[]),
            vec![],
            AuthzAuditConfig::default(),
        )
        .await;

        let decision = ctx
            .check_resource(&ResourceRef::database("sales"), AccessType::Read)
            .await
            .unwrap();
        assert!(!decision.is_allowed());
    }
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_valid::Valid;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::error::AdminError;
use crate::{
    AppState,
    authz::permissions,
    middleware::AuthzContext,
    models::{AccessRule, AccessRuleQuery, CreateAccessRule, RuleSubject, SetAccessRules, UpdateAccessRule},
    services::{AuditEvent, actions},
};

#[derive(Debug, Serialize)]
pub struct AccessRuleListResponse {
    pub data: Vec<AccessRule>,
}

#[tracing::instrument(name = "admin.access_rules.list", skip(state, authz, query))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Query(query): Query<AccessRuleQuery>,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    authz.require(permissions::ACCESS_RULES_VIEW).await?;
    let data = state.services.access_rules.list(&query).await?;
    Ok(Json(AccessRuleListResponse { data }))
}

#[tracing::instrument(name = "admin.access_rules.get", skip(state, authz), fields(%rule_id))]
pub async fn get(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(rule_id): Path<Uuid>,
) -> Result<Json<AccessRule>, AdminError> {
    authz.require(permissions::ACCESS_RULES_VIEW).await?;
    Ok(Json(state.services.access_rules.get(rule_id).await?))
}

/// Create a rule for exactly one of a role or a user
#[tracing::instrument(name = "admin.access_rules.create", skip(state, authz, input))]
pub async fn create(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<CreateAccessRule>>,
) -> Result<(StatusCode, Json<AccessRule>), AdminError> {
    authz.require(permissions::ACCESS_RULES_MANAGE).await?;

    let rule = state
        .services
        .access_rules
        .create(input, authz.actor_id())
        .await?;
    authz.record(
        AuditEvent::success(actions::ACCESS_RULE_CREATE)
            .resource("access_rule", rule.id)
            .details(rule_details(&rule)),
    );

    Ok((StatusCode::CREATED, Json(rule)))
}

#[tracing::instrument(name = "admin.access_rules.update", skip(state, authz, input), fields(%rule_id))]
pub async fn update(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(rule_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateAccessRule>>,
) -> Result<Json<AccessRule>, AdminError> {
    authz.require(permissions::ACCESS_RULES_MANAGE).await?;

    let rule = state.services.access_rules.update(rule_id, input).await?;
    authz.record(
        AuditEvent::success(actions::ACCESS_RULE_UPDATE)
            .resource("access_rule", rule_id)
            .details(rule_details(&rule)),
    );

    Ok(Json(rule))
}

#[tracing::instrument(name = "admin.access_rules.delete", skip(state, authz), fields(%rule_id))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(rule_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    authz.require(permissions::ACCESS_RULES_MANAGE).await?;

    let rule = state.services.access_rules.delete(rule_id).await?;
    authz.record(
        AuditEvent::success(actions::ACCESS_RULE_DELETE)
            .resource("access_rule", rule_id)
            .details(rule_details(&rule)),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(name = "admin.access_rules.list_for_role", skip(state, authz), fields(%role_id))]
pub async fn list_for_role(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    list_for_subject(&state, &authz, RuleSubject::Role(role_id)).await
}

#[tracing::instrument(name = "admin.access_rules.list_for_user", skip(state, authz), fields(%user_id))]
pub async fn list_for_user(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    list_for_subject(&state, &authz, RuleSubject::User(user_id)).await
}

/// Replace every rule of a role in one transaction
#[tracing::instrument(name = "admin.access_rules.replace_for_role", skip(state, authz, input), fields(%role_id))]
pub async fn replace_for_role(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<SetAccessRules>>,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    replace_for_subject(&state, &authz, RuleSubject::Role(role_id), input).await
}

/// Replace every rule of a user in one transaction
#[tracing::instrument(name = "admin.access_rules.replace_for_user", skip(state, authz, input), fields(%user_id))]
pub async fn replace_for_user(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<SetAccessRules>>,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    replace_for_subject(&state, &authz, RuleSubject::User(user_id), input).await
}

async fn list_for_subject(
    state: &AppState,
    authz: &AuthzContext,
    subject: RuleSubject,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    authz.require(permissions::ACCESS_RULES_VIEW).await?;

    let query = AccessRuleQuery {
        role_id: subject.role_id(),
        user_id: subject.user_id(),
        connection_id: None,
    };
    let data = state.services.access_rules.list(&query).await?;
    Ok(Json(AccessRuleListResponse { data }))
}

async fn replace_for_subject(
    state: &AppState,
    authz: &AuthzContext,
    subject: RuleSubject,
    input: SetAccessRules,
) -> Result<Json<AccessRuleListResponse>, AdminError> {
    authz.require(permissions::ACCESS_RULES_MANAGE).await?;

    let data = state
        .services
        .access_rules
        .replace_for_subject(subject, input.rules, authz.actor_id())
        .await?;
    authz.record(
        AuditEvent::success(actions::ACCESS_RULE_REPLACE)
            .resource(subject.kind(), subject.id())
            .details(json!({ "count": data.len() })),
    );

    Ok(Json(AccessRuleListResponse { data }))
}

fn rule_details(rule: &AccessRule) -> serde_json::Value {
    json!({
        "subject": rule.subject,
        "connection_id": rule.connection_id,
        "database_pattern": rule.database_pattern,
        "table_pattern": rule.table_pattern,
        "access_type": rule.access_type,
        "is_allowed": rule.is_allowed,
        "priority": rule.priority,
    })
}

use axum::{
    Extension, Json,
    extract::{Path, State},
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
    models::{CreateRole, Role, RoleWithPermissions, SetRolePermissions, UpdateRole},
    services::{AuditEvent, actions},
};

#[derive(Debug, Serialize)]
pub struct RoleListResponse {
    pub data: Vec<Role>,
}

#[derive(Debug, Serialize)]
pub struct RolePermissionsResponse {
    pub role_id: Uuid,
    pub permissions: Vec<String>,
}

#[tracing::instrument(name = "admin.roles.list", skip(state, authz))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
) -> Result<Json<RoleListResponse>, AdminError> {
    authz.require(permissions::ROLES_VIEW).await?;
    let data = state.services.roles.list().await?;
    Ok(Json(RoleListResponse { data }))
}

#[tracing::instrument(name = "admin.roles.get", skip(state, authz), fields(%role_id))]
pub async fn get(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RoleWithPermissions>, AdminError> {
    authz.require(permissions::ROLES_VIEW).await?;
    Ok(Json(state.services.roles.get(role_id).await?))
}

/// Create a custom role
#[tracing::instrument(name = "admin.roles.create", skip(state, authz, input))]
pub async fn create(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<CreateRole>>,
) -> Result<(StatusCode, Json<RoleWithPermissions>), AdminError> {
    authz.require(permissions::ROLES_CREATE).await?;

    let role = state.services.roles.create(input).await?;
    authz.record(
        AuditEvent::success(actions::ROLE_CREATE)
            .resource("role", role.role.id)
            .details(json!({
                "name": role.role.name,
                "permissions": role.permissions,
            })),
    );

    Ok((StatusCode::CREATED, Json(role)))
}

/// Update a custom role. System roles are rejected.
#[tracing::instrument(name = "admin.roles.update", skip(state, authz, input), fields(%role_id))]
pub async fn update(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateRole>>,
) -> Result<Json<Role>, AdminError> {
    authz.require(permissions::ROLES_UPDATE).await?;

    let role = state.services.roles.update(role_id, input).await?;
    authz.record(AuditEvent::success(actions::ROLE_UPDATE).resource("role", role_id));

    Ok(Json(role))
}

#[tracing::instrument(name = "admin.roles.delete", skip(state, authz), fields(%role_id))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    authz.require(permissions::ROLES_DELETE).await?;

    state.services.roles.delete(role_id).await?;
    authz.record(AuditEvent::success(actions::ROLE_DELETE).resource("role", role_id));

    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(name = "admin.roles.get_permissions", skip(state, authz), fields(%role_id))]
pub async fn get_permissions(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RolePermissionsResponse>, AdminError> {
    authz.require(permissions::ROLES_VIEW).await?;

    let role = state.services.roles.get(role_id).await?;
    Ok(Json(RolePermissionsResponse {
        role_id,
        permissions: role.permissions,
    }))
}

/// Replace a custom role's permission set
#[tracing::instrument(name = "admin.roles.set_permissions", skip(state, authz, input), fields(%role_id))]
pub async fn set_permissions(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(role_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<SetRolePermissions>>,
) -> Result<Json<RolePermissionsResponse>, AdminError> {
    authz.require(permissions::ROLES_UPDATE).await?;

    let role = state
        .services
        .roles
        .set_permissions(role_id, input.permissions)
        .await?;
    authz.record(
        AuditEvent::success(actions::ROLE_SET_PERMISSIONS)
            .resource("role", role_id)
            .details(json!({ "permissions": role.permissions })),
    );

    Ok(Json(RolePermissionsResponse {
        role_id,
        permissions: role.permissions,
    }))
}

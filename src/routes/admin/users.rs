use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use axum_valid::Valid;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::{PaginationMeta, error::AdminError};
use crate::{
    AppState,
    authz::permissions,
    db::ListParams,
    middleware::AuthzContext,
    models::{CreateUser, ResetPassword, SetUserRole, UpdateUser, User, UserQuery},
    services::{AuditEvent, actions},
};

/// Query parameters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub role_id: Option<Uuid>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub include_deleted: bool,
}

/// Paginated list of users
#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub data: Vec<User>,
    pub pagination: PaginationMeta,
}

/// Create a user
#[tracing::instrument(name = "admin.users.create", skip(state, authz, input))]
pub async fn create(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<CreateUser>>,
) -> Result<(StatusCode, Json<User>), AdminError> {
    authz.require(permissions::USERS_CREATE).await?;
    if input.role_id.is_some() {
        authz.require(permissions::ROLES_ASSIGN).await?;
    }

    let user = state.services.users.create(input).await?;

    authz.record(
        AuditEvent::success(actions::USER_CREATE)
            .resource("user", user.id)
            .details(json!({
                "username": user.username,
                "role_id": user.role.as_ref().map(|r| r.id),
            })),
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user by ID
#[tracing::instrument(name = "admin.users.get", skip(state, authz), fields(%user_id))]
pub async fn get(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AdminError> {
    authz.require(permissions::USERS_VIEW).await?;
    Ok(Json(state.services.users.get_by_id(user_id).await?))
}

/// List users
#[tracing::instrument(name = "admin.users.list", skip(state, authz, query))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, AdminError> {
    authz.require(permissions::USERS_VIEW).await?;

    let params = ListParams {
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };
    let filter = UserQuery {
        role_id: query.role_id,
        is_active: query.is_active,
        include_deleted: query.include_deleted,
    };
    let page = state.services.users.list(&filter, params.clone()).await?;

    Ok(Json(UserListResponse {
        data: page.items,
        pagination: PaginationMeta {
            limit: params.limit(),
            offset: params.offset(),
            has_more: page.has_more,
        },
    }))
}

/// Update a user's profile or active flag
#[tracing::instrument(name = "admin.users.update", skip(state, authz, input), fields(%user_id))]
pub async fn update(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateUser>>,
) -> Result<Json<User>, AdminError> {
    authz.require(permissions::USERS_UPDATE).await?;

    let is_active = input.is_active;
    let user = state
        .services
        .users
        .update(user_id, input, authz.actor_id())
        .await?;

    authz.record(
        AuditEvent::success(actions::USER_UPDATE)
            .resource("user", user_id)
            .details(json!({ "is_active": is_active })),
    );

    Ok(Json(user))
}

/// Soft-delete a user
#[tracing::instrument(name = "admin.users.delete", skip(state, authz), fields(%user_id))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    authz.require(permissions::USERS_DELETE).await?;

    state.services.users.delete(user_id, authz.actor_id()).await?;
    authz.record(AuditEvent::success(actions::USER_DELETE).resource("user", user_id));

    Ok(StatusCode::NO_CONTENT)
}

/// Assign or clear a user's role
#[tracing::instrument(name = "admin.users.set_role", skip(state, authz, input), fields(%user_id))]
pub async fn set_role(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<SetUserRole>>,
) -> Result<Json<User>, AdminError> {
    authz.require(permissions::ROLES_ASSIGN).await?;

    let user = state.services.users.set_role(user_id, input.role_id).await?;
    authz.record(
        AuditEvent::success(actions::USER_SET_ROLE)
            .resource("user", user_id)
            .details(json!({ "role_id": input.role_id })),
    );

    Ok(Json(user))
}

/// Reset a user's password
#[tracing::instrument(name = "admin.users.reset_password", skip(state, authz, input), fields(%user_id))]
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(user_id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<ResetPassword>>,
) -> Result<StatusCode, AdminError> {
    authz.require(permissions::USERS_UPDATE).await?;

    state
        .services
        .users
        .reset_password(user_id, input.password)
        .await?;
    authz.record(AuditEvent::success(actions::USER_RESET_PASSWORD).resource("user", user_id));

    Ok(StatusCode::NO_CONTENT)
}

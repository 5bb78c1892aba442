use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use super::{PaginationMeta, error::AdminError};
use crate::{
    AppState,
    authz::permissions,
    db::ListParams,
    middleware::AuthzContext,
    models::{AuditLog, AuditLogQuery},
};

/// Paginated list of audit log entries
#[derive(Debug, Serialize)]
pub struct AuditLogListResponse {
    pub data: Vec<AuditLog>,
    pub pagination: PaginationMeta,
}

/// List audit log entries, newest first
#[tracing::instrument(name = "admin.audit_logs.list", skip(state, authz, query))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, AdminError> {
    authz.require(permissions::AUDIT_VIEW).await?;

    let params = ListParams {
        limit: query.limit,
        offset: query.offset,
        ..Default::default()
    };
    let page = state.services.audit_logs.list(query).await?;

    Ok(Json(AuditLogListResponse {
        data: page.items,
        pagination: PaginationMeta {
            limit: params.limit(),
            offset: params.offset(),
            has_more: page.has_more,
        },
    }))
}

#[tracing::instrument(name = "admin.audit_logs.get", skip(state, authz), fields(%log_id))]
pub async fn get(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(log_id): Path<Uuid>,
) -> Result<Json<AuditLog>, AdminError> {
    authz.require(permissions::AUDIT_VIEW).await?;

    let log = state
        .services
        .audit_logs
        .get_by_id(log_id)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("Audit log '{}' not found", log_id)))?;
    Ok(Json(log))
}

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
    models::{Connection, CreateConnection},
    services::{AuditEvent, actions},
};

#[derive(Debug, Serialize)]
pub struct ConnectionListResponse {
    pub data: Vec<Connection>,
}

#[tracing::instrument(name = "admin.connections.list", skip(state, authz))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
) -> Result<Json<ConnectionListResponse>, AdminError> {
    authz.require(permissions::CONNECTIONS_VIEW).await?;
    let data = state.services.connections.list().await?;
    Ok(Json(ConnectionListResponse { data }))
}

#[tracing::instrument(name = "admin.connections.get", skip(state, authz), fields(%connection_id))]
pub async fn get(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(connection_id): Path<Uuid>,
) -> Result<Json<Connection>, AdminError> {
    authz.require(permissions::CONNECTIONS_VIEW).await?;

    let connection = state
        .services
        .connections
        .get_by_id(connection_id)
        .await?
        .ok_or_else(|| AdminError::NotFound(format!("Connection '{}' not found", connection_id)))?;
    Ok(Json(connection))
}

/// Register a storage cluster
#[tracing::instrument(name = "admin.connections.create", skip(state, authz, input))]
pub async fn create(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<CreateConnection>>,
) -> Result<(StatusCode, Json<Connection>), AdminError> {
    authz.require(permissions::CONNECTIONS_MANAGE).await?;

    let connection = state.services.connections.create(input).await?;
    authz.record(
        AuditEvent::success(actions::CONNECTION_CREATE)
            .resource("connection", connection.id)
            .details(json!({
                "name": connection.name,
                "host": connection.host,
                "port": connection.port,
            })),
    );

    Ok((StatusCode::CREATED, Json(connection)))
}

/// Remove a storage cluster and every rule scoped to it
#[tracing::instrument(name = "admin.connections.delete", skip(state, authz), fields(%connection_id))]
pub async fn delete(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
    Path(connection_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    authz.require(permissions::CONNECTIONS_MANAGE).await?;

    state.services.connections.delete(connection_id).await?;
    authz.record(
        AuditEvent::success(actions::CONNECTION_DELETE).resource("connection", connection_id),
    );

    Ok(StatusCode::NO_CONTENT)
}

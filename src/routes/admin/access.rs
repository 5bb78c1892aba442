//! Data access evaluation for the calling principal.
//!
//! Responses carry only the decision or the redacted listing. Which rule
//! decided is written to the audit log, never returned.

use axum::{Extension, Json};
use axum_valid::Valid;
use serde::Serialize;

use super::error::AdminError;
use crate::{
    authz::{Decision, permissions},
    middleware::AuthzContext,
    models::{AccessCheckRequest, AccessType, FilterDatabasesRequest, FilterTablesRequest},
};

#[derive(Debug, Serialize)]
pub struct AccessCheckResponse {
    pub allowed: bool,
    pub decision: Decision,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub access_type: AccessType,
}

#[derive(Debug, Serialize)]
pub struct DatabaseListResponse {
    pub databases: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TableListResponse {
    pub database: String,
    pub tables: Vec<String>,
}

#[tracing::instrument(name = "admin.access.check", skip(authz, input))]
pub async fn check(
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<AccessCheckRequest>>,
) -> Result<Json<AccessCheckResponse>, AdminError> {
    authz.require(permissions::DATABASE_BROWSE).await?;

    let decision = authz
        .check_resource(&input.resource, input.access_type)
        .await?;

    Ok(Json(AccessCheckResponse {
        allowed: decision.is_allowed(),
        decision: decision.decision,
        database: input.resource.database,
        table: input.resource.table,
        access_type: input.access_type,
    }))
}

/// Keep only the databases the caller may read
#[tracing::instrument(name = "admin.access.databases", skip(authz, input))]
pub async fn databases(
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<FilterDatabasesRequest>>,
) -> Result<Json<DatabaseListResponse>, AdminError> {
    authz.require(permissions::DATABASE_BROWSE).await?;

    let databases = authz
        .filter_databases(input.connection_id, input.databases)
        .await?;
    Ok(Json(DatabaseListResponse { databases }))
}

/// Keep only the tables of one database the caller may read
#[tracing::instrument(name = "admin.access.tables", skip(authz, input))]
pub async fn tables(
    Extension(authz): Extension<AuthzContext>,
    Valid(Json(input)): Valid<Json<FilterTablesRequest>>,
) -> Result<Json<TableListResponse>, AdminError> {
    authz.require(permissions::DATABASE_BROWSE).await?;

    let tables = authz
        .filter_tables(input.connection_id, &input.database, input.tables)
        .await?;
    Ok(Json(TableListResponse {
        database: input.database,
        tables,
    }))
}

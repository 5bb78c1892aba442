use axum::{Extension, Json, extract::State};
use serde::Serialize;

use super::error::AdminError;
use crate::{
    AppState,
    authz::{CATALOG_VERSION, permissions},
    middleware::AuthzContext,
    models::PermissionCategory,
};

#[derive(Debug, Serialize)]
pub struct PermissionCatalogResponse {
    pub version: u32,
    pub categories: Vec<PermissionCategory>,
}

/// The permission catalogue grouped by category
#[tracing::instrument(name = "admin.permissions.list", skip(state, authz))]
pub async fn list(
    State(state): State<AppState>,
    Extension(authz): Extension<AuthzContext>,
) -> Result<Json<PermissionCatalogResponse>, AdminError> {
    authz.require(permissions::ROLES_VIEW).await?;

    let categories = state.services.roles.catalog().await?;
    Ok(Json(PermissionCatalogResponse {
        version: CATALOG_VERSION,
        categories,
    }))
}

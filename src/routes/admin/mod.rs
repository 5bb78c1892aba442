//! Administrative API under `/admin/v1`.
//!
//! Every handler takes the caller's [`AuthzContext`](crate::middleware::AuthzContext)
//! and checks a catalogue permission before touching the store.

mod access;
mod access_rules;
mod audit_logs;
mod connections;
mod error;
mod permissions;
mod roles;
mod users;

use axum::{
    Router,
    routing::{get, post, put},
};
pub use error::{AdminError, ErrorResponse};
use serde::Serialize;

use crate::AppState;

/// Offset pagination metadata for list responses.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

pub fn get_admin_routes() -> Router<AppState> {
    Router::new().nest("/v1", admin_v1_routes())
}

fn admin_v1_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{user_id}",
            get(users::get).patch(users::update).delete(users::delete),
        )
        .route("/users/{user_id}/role", put(users::set_role))
        .route("/users/{user_id}/password", put(users::reset_password))
        .route(
            "/users/{user_id}/access-rules",
            get(access_rules::list_for_user).put(access_rules::replace_for_user),
        )
        // Roles and the permission catalogue
        .route("/roles", get(roles::list).post(roles::create))
        .route(
            "/roles/{role_id}",
            get(roles::get).patch(roles::update).delete(roles::delete),
        )
        .route(
            "/roles/{role_id}/permissions",
            get(roles::get_permissions).put(roles::set_permissions),
        )
        .route(
            "/roles/{role_id}/access-rules",
            get(access_rules::list_for_role).put(access_rules::replace_for_role),
        )
        .route("/permissions", get(permissions::list))
        // Access rules
        .route(
            "/access-rules",
            get(access_rules::list).post(access_rules::create),
        )
        .route(
            "/access-rules/{rule_id}",
            get(access_rules::get)
                .patch(access_rules::update)
                .delete(access_rules::delete),
        )
        // Storage connections
        .route(
            "/connections",
            get(connections::list).post(connections::create),
        )
        .route(
            "/connections/{connection_id}",
            get(connections::get).delete(connections::delete),
        )
        // Access evaluation for the caller
        .route("/access/check", post(access::check))
        .route("/access/databases", post(access::databases))
        .route("/access/tables", post(access::tables))
        // Audit log
        .route("/audit-logs", get(audit_logs::list))
        .route("/audit-logs/{log_id}", get(audit_logs::get))
}

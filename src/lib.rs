//! Access administration for columnar databases.
//!
//! Users sign in with a password and receive a short-lived signed access
//! token plus a rotating refresh token. Roles grant functional permissions
//! from a fixed catalogue. Access rules attached to roles or users decide
//! which databases and tables a caller may read or write. The matching rule
//! with the highest priority wins, then the most specific pattern. A deny
//! only beats an allow when both tie on priority and specificity.

pub mod auth;
pub mod authz;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
#[cfg(feature = "server")]
pub mod observability;
pub mod routes;
pub mod services;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::task::TaskTracker;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    auth::{TokenSigner, TokenVerifier},
    authz::{PermissionResolver, ResourceAccessEvaluator},
    config::{AdminConfig, ConfigError},
    db::DbPool,
    services::Services,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AdminConfig>,
    pub db: Arc<DbPool>,
    pub services: Services,
    pub token_verifier: Arc<TokenVerifier>,
    /// Functional permission checks against the token snapshot and the store.
    pub resolver: PermissionResolver,
    /// Resource access decisions over the stored access rules.
    pub evaluator: ResourceAccessEvaluator,
    /// Task tracker for background tasks (audit writes).
    /// Ensures spawned tasks complete during graceful shutdown.
    pub task_tracker: TaskTracker,
}

impl AppState {
    pub fn new(
        config: Arc<AdminConfig>,
        db: Arc<DbPool>,
        task_tracker: TaskTracker,
    ) -> Result<Self, ConfigError> {
        let tokens = &config.auth.tokens;
        let signer = Arc::new(TokenSigner::new(tokens)?);
        let token_verifier = Arc::new(TokenVerifier::new(tokens));

        let services = Services::new(db.clone(), signer, tokens, task_tracker.clone())?;
        let resolver = PermissionResolver::new(db.roles());
        let evaluator =
            ResourceAccessEvaluator::new(db.access_rules(), config.auth.bypass_roles.clone());

        Ok(Self {
            config,
            db,
            services,
            token_verifier,
            resolver,
            evaluator,
            task_tracker,
        })
    }
}

pub fn build_app(state: AppState) -> Router {
    let server = &state.config.server;
    let body_limit = server.body_limit_bytes;
    let request_timeout = Duration::from_secs(server.request_timeout_secs);

    let session_routes = Router::new()
        .route("/logout", post(routes::auth::logout))
        .route("/me", get(routes::auth::me))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/session", get(routes::auth::session))
        .merge(session_routes);

    // Layers wrap outward: authentication runs before authorization.
    let admin_routes = routes::admin::get_admin_routes()
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authz_middleware,
        ))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .nest("/auth", auth_routes)
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

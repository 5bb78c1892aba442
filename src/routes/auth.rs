//! Password login and session endpoints under `/auth`.

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthError, Principal},
    middleware::{ClientInfo, bearer_token},
    models::{RoleRef, User},
    services::{AuditEvent, IssuedSession, actions},
};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, max = 128))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub user: User,
}

impl From<IssuedSession> for TokenResponse {
    fn from(issued: IssuedSession) -> Self {
        Self {
            expires_in: (issued.access.expires_at - Utc::now()).num_seconds().max(0),
            access_token: issued.access.token,
            token_type: "Bearer",
            expires_at: issued.access.expires_at,
            refresh_token: issued.refresh_token,
            refresh_expires_at: issued.refresh_expires_at,
            user: issued.user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    /// Permissions currently granted, read from the store
    pub permissions: Vec<String>,
    pub session_id: uuid::Uuid,
    pub token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionInfo {
    Anonymous {
        authenticated: bool,
    },
    Authenticated {
        authenticated: bool,
        user_id: uuid::Uuid,
        username: String,
        roles: Vec<RoleRef>,
        expires_at: DateTime<Utc>,
    },
}

/// Exchange a username and password for an access token and refresh token
#[tracing::instrument(name = "auth.login", skip(state, client, input), fields(username = %input.username))]
pub async fn login(
    State(state): State<AppState>,
    client: ClientInfo,
    Valid(Json(input)): Valid<Json<LoginRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let audit = &state.services.audit_logs;

    match state
        .services
        .sessions
        .login(&input.username, &input.password, &client)
        .await
    {
        Ok(issued) => {
            audit.record(
                AuditEvent::success(actions::LOGIN)
                    .actor(issued.user.id)
                    .resource("session", issued.session_id)
                    .client(&client),
            );
            Ok(Json(issued.into()))
        }
        Err(err) => {
            let err = AuthError::from(err);
            audit.record(
                AuditEvent::failure(actions::LOGIN_FAILED)
                    .error(err.reason())
                    .details(json!({ "username": input.username }))
                    .client(&client),
            );
            Err(err)
        }
    }
}

/// Rotate a refresh token
#[tracing::instrument(name = "auth.refresh", skip(state, client, input))]
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientInfo,
    Valid(Json(input)): Valid<Json<RefreshRequest>>,
) -> Result<Json<TokenResponse>, AuthError> {
    let audit = &state.services.audit_logs;

    match state.services.sessions.refresh(&input.refresh_token).await {
        Ok(issued) => {
            audit.record(
                AuditEvent::success(actions::REFRESH)
                    .actor(issued.user.id)
                    .resource("session", issued.session_id)
                    .client(&client),
            );
            Ok(Json(issued.into()))
        }
        Err(err) => {
            let err = AuthError::from(err);
            audit.record(
                AuditEvent::failure(actions::REFRESH_FAILED)
                    .error(err.reason())
                    .client(&client),
            );
            Err(err)
        }
    }
}

/// Revoke the caller's session
#[tracing::instrument(name = "auth.logout", skip(state, principal, client))]
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    client: ClientInfo,
) -> Result<StatusCode, AuthError> {
    state
        .services
        .sessions
        .logout(principal.session_id)
        .await?;

    state.services.audit_logs.record(
        AuditEvent::success(actions::LOGOUT)
            .actor(principal.user_id)
            .resource("session", principal.session_id)
            .client(&client),
    );
    Ok(StatusCode::NO_CONTENT)
}

/// The caller's account and current permissions
#[tracing::instrument(name = "auth.me", skip(state, principal))]
pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<MeResponse>, AuthError> {
    let user = state
        .db
        .users()
        .get_by_id(principal.user_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let mut permissions = state
        .db
        .roles()
        .permissions_for_user(principal.user_id)
        .await?;
    permissions.sort();

    Ok(Json(MeResponse {
        user,
        permissions,
        session_id: principal.session_id,
        token_expires_at: principal.expires_at,
    }))
}

/// Whether the request carries a valid access token. Never fails.
#[tracing::instrument(name = "auth.session", skip(state, headers))]
pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> Json<SessionInfo> {
    let info = match state.token_verifier.verify_optional(bearer_token(&headers)) {
        Some(token) => SessionInfo::Authenticated {
            authenticated: true,
            user_id: token.user_id,
            username: token.username,
            roles: token.roles,
            expires_at: token.expires_at,
        },
        None => SessionInfo::Anonymous {
            authenticated: false,
        },
    };
    Json(info)
}

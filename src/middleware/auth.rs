use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use super::ClientInfo;
use crate::{
    AppState,
    auth::{AuthError, Principal},
    services::{AuditEvent, actions},
};

/// The token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware that requires a valid access token.
///
/// On success the request carries the [`Principal`] and [`ClientInfo`]
/// extensions. Every rejection is audited as `auth.token_rejected`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let client_info = ClientInfo::from_request(&req);

    let result = match bearer_token(req.headers()) {
        Some(token) => state
            .token_verifier
            .verify(token)
            .map(Principal::from)
            .map_err(AuthError::from),
        None => Err(AuthError::MissingCredentials),
    };

    let principal = match result {
        Ok(principal) => principal,
        Err(err) => {
            tracing::info!(
                reason = err.reason(),
                path = %req.uri().path(),
                "Rejected request credentials"
            );
            state.services.audit_logs.record(
                AuditEvent::failure(actions::TOKEN_REJECTED)
                    .error(err.reason())
                    .details(json!({
                        "method": req.method().as_str(),
                        "path": req.uri().path(),
                    }))
                    .client(&client_info),
            );
            return Err(err);
        }
    };

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(client_info);
    Ok(next.run(req).await)
}

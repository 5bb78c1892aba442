//! Signed access tokens.
//!
//! An access token is a short-lived HMAC JWT carrying the user's identity, role
//! references and a point-in-time snapshot of their functional permissions. The
//! snapshot is a cache: [`crate::authz::PermissionResolver`] treats it as an
//! optimistic allow and falls back to the store on a miss.
//!
//! Verification is synchronous and never touches the store.

use std::collections::HashSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{ConfigError, TokenConfig},
    models::RoleRef,
};

/// Value of the `typ` claim on access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims embedded in an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    /// Username, for display only
    pub name: String,
    /// Session ID
    pub sid: Uuid,
    pub roles: Vec<RoleRef>,
    /// Permission snapshot at issuance
    pub perms: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub typ: String,
}

/// Why a token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is malformed")]
    Malformed,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Identity and permission snapshot for a token about to be issued.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: Uuid,
    pub username: &'a str,
    pub session_id: Uuid,
    pub roles: &'a [RoleRef],
    pub permissions: &'a [String],
}

/// A freshly signed access token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The result of a successful verification.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub user_id: Uuid,
    pub username: String,
    pub session_id: Uuid,
    pub roles: Vec<RoleRef>,
    pub permissions: HashSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct TokenSigner {
    key: EncodingKey,
    header: Header,
    issuer: String,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(config: &TokenConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            key: EncodingKey::from_secret(config.secret.as_bytes()),
            header: Header::new(config.algorithm.to_jwt_algorithm()),
            issuer: config.issuer.clone(),
            ttl: config.access_ttl()?,
        })
    }

    pub fn sign(&self, subject: &TokenSubject<'_>) -> Result<IssuedToken, TokenError> {
        self.sign_at(subject, Utc::now())
    }

    /// Sign with an explicit issuance time.
    pub(crate) fn sign_at(
        &self,
        subject: &TokenSubject<'_>,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = issued_at + self.ttl;
        let claims = AccessClaims {
            sub: subject.user_id,
            name: subject.username.to_string(),
            sid: subject.session_id,
            roles: subject.roles.to_vec(),
            perms: subject.permissions.to_vec(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            iss: self.issuer.clone(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
        };

        let token = encode(&self.header, &claims, &self.key).map_err(TokenError::Signing)?;
        Ok(IssuedToken { token, expires_at })
    }
}

pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(config: &TokenConfig) -> Self {
        let mut validation = Validation::new(config.algorithm.to_jwt_algorithm());
        validation.leeway = config.leeway_secs;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        }
    }

    /// Check signature, expiry, issuer and token type.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, TokenError> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.typ != ACCESS_TOKEN_TYPE {
            return Err(TokenError::Malformed);
        }

        let issued_at = Utc
            .timestamp_opt(claims.iat, 0)
            .single()
            .ok_or(TokenError::Malformed)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Malformed)?;

        Ok(VerifiedToken {
            user_id: claims.sub,
            username: claims.name,
            session_id: claims.sid,
            roles: claims.roles,
            permissions: claims.perms.into_iter().collect(),
            issued_at,
            expires_at,
        })
    }

    /// Like [`verify`](Self::verify), but absent or rejected tokens yield `None`.
    pub fn verify_optional(&self, token: Option<&str>) -> Option<VerifiedToken> {
        let token = token?;
        match self.verify(token) {
            Ok(verified) => Some(verified),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid optional token");
                None
            }
        }
    }
}

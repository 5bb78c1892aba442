//! Password login, refresh token rotation and logout.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    auth::{
        AuthError, IssuedToken, TokenError, TokenSigner, password, refresh_token,
        token::TokenSubject,
    },
    db::{DbError, DbPool},
    middleware::ClientInfo,
    models::{CreateSession, User},
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidCredentials => AuthError::InvalidCredentials,
            SessionError::InvalidRefreshToken => AuthError::InvalidRefreshToken,
            SessionError::Token(e) => AuthError::Internal(e.to_string()),
            SessionError::Database(e) => AuthError::from(e),
        }
    }
}

/// Tokens handed to a client after login or refresh.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: User,
    pub session_id: Uuid,
    pub access: IssuedToken,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    db: Arc<DbPool>,
    signer: Arc<TokenSigner>,
    refresh_ttl: Duration,
}

impl SessionService {
    pub fn new(db: Arc<DbPool>, signer: Arc<TokenSigner>, refresh_ttl: Duration) -> Self {
        Self {
            db,
            signer,
            refresh_ttl,
        }
    }

    /// Verify a username and password and open a new session.
    ///
    /// Unknown, deactivated and wrong-password cases all return
    /// [`SessionError::InvalidCredentials`].
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client: &ClientInfo,
    ) -> Result<IssuedSession, SessionError> {
        let credentials = self.db.users().get_credentials_by_username(username).await?;

        // Unknown users still pay for one argon2 verification.
        let candidate = password.to_string();
        let stored = credentials.as_ref().map(|c| c.password_hash.clone());
        let verified = tokio::task::spawn_blocking(move || match stored {
            Some(stored) => password::verify_password(&candidate, &stored),
            None => password::verify_dummy(&candidate),
        })
        .await
        .map_err(|e| DbError::Internal(e.to_string()))?;

        let Some(credentials) = credentials.filter(|c| verified && c.user.is_active) else {
            return Err(SessionError::InvalidCredentials);
        };

        let user = credentials.user;
        let refresh = refresh_token::generate();
        let session = self
            .db
            .sessions()
            .create(CreateSession {
                user_id: user.id,
                token_hash: refresh.hash,
                ip_address: client.ip_address.clone(),
                user_agent: client.user_agent.clone(),
                expires_at: Utc::now() + self.refresh_ttl,
            })
            .await?;
        self.db.users().record_login(user.id).await?;

        let access = self.issue_access_token(&user, session.id).await?;
        tracing::info!(user_id = %user.id, session_id = %session.id, "User logged in");

        Ok(IssuedSession {
            user,
            session_id: session.id,
            access,
            refresh_token: refresh.token,
            refresh_expires_at: session.expires_at,
        })
    }

    /// Exchange a refresh token for a new access token and a new refresh token.
    ///
    /// The presented token is single use. A replayed token fails even if the
    /// session is still live. The session keeps its original expiry.
    pub async fn refresh(&self, presented: &str) -> Result<IssuedSession, SessionError> {
        if !refresh_token::is_well_formed(presented) {
            return Err(SessionError::InvalidRefreshToken);
        }
        let old_hash = refresh_token::hash(presented);

        let session = self
            .db
            .sessions()
            .get_by_token_hash(&old_hash)
            .await?
            .filter(|s| s.is_active(Utc::now()))
            .filter(|s| refresh_token::matches_hash(presented, &s.token_hash))
            .ok_or(SessionError::InvalidRefreshToken)?;

        let user = match self.db.users().get_by_id(session.user_id).await? {
            Some(user) if user.is_active => user,
            _ => {
                self.db.sessions().revoke(session.id).await?;
                return Err(SessionError::InvalidRefreshToken);
            }
        };

        let next = refresh_token::generate();
        let rotated = self
            .db
            .sessions()
            .rotate(session.id, &old_hash, &next.hash)
            .await?;
        if !rotated {
            tracing::warn!(session_id = %session.id, "Refresh token lost a rotation race");
            return Err(SessionError::InvalidRefreshToken);
        }

        let access = self.issue_access_token(&user, session.id).await?;
        tracing::debug!(user_id = %user.id, session_id = %session.id, "Session refreshed");

        Ok(IssuedSession {
            user,
            session_id: session.id,
            access,
            refresh_token: next.token,
            refresh_expires_at: session.expires_at,
        })
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), SessionError> {
        match self.db.sessions().revoke(session_id).await {
            Ok(()) | Err(DbError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sign an access token carrying the user's current role and permissions.
    async fn issue_access_token(
        &self,
        user: &User,
        session_id: Uuid,
    ) -> Result<IssuedToken, SessionError> {
        let permissions = self.db.roles().permissions_for_user(user.id).await?;
        let roles: Vec<_> = user.role.iter().cloned().collect();

        Ok(self.signer.sign(&TokenSubject {
            user_id: user.id,
            username: &user.username,
            session_id,
            roles: &roles,
            permissions: &permissions,
        })?)
    }
}

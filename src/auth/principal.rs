//! The authenticated actor behind a request.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::VerifiedToken;
use crate::models::RoleRef;

/// Identity and cached permission snapshot of the caller, built from a
/// verified access token.
///
/// `roles` supports several entries even though the store assigns at most one.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub username: String,
    pub session_id: Uuid,
    pub roles: Vec<RoleRef>,
    /// Permissions held when the token was issued.
    pub permissions: HashSet<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    pub fn role_ids(&self) -> Vec<Uuid> {
        self.roles.iter().map(|r| r.id).collect()
    }

    pub fn has_role_named(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }

    /// Snapshot membership only. Absence is not a denial.
    pub fn has_cached_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}

impl From<VerifiedToken> for Principal {
    fn from(token: VerifiedToken) -> Self {
        Self {
            user_id: token.user_id,
            username: token.username,
            session_id: token.session_id,
            roles: token.roles,
            permissions: token.permissions,
            issued_at: token.issued_at,
            expires_at: token.expires_at,
        }
    }
}

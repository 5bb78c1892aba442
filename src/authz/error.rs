//! Authorization errors.

use thiserror::Error;

use crate::{
    db::DbError,
    models::{AccessType, RuleDefinitionError},
};

#[derive(Debug, Error)]
pub enum AuthzError {
    /// Functional permission missing after both the snapshot and the store were consulted.
    #[error("Missing required permission '{permission}'")]
    PermissionDenied { permission: String },

    /// Resource evaluation denied, or no rule matched.
    #[error("{access} access denied on '{resource}'")]
    ResourceAccessDenied { resource: String, access: AccessType },

    #[error("Invalid access rule: {0}")]
    InvalidRuleDefinition(#[from] RuleDefinitionError),

    /// The store could not be reached. Always treated as a denial.
    #[error("Authorization store unavailable")]
    StoreUnavailable(#[source] DbError),
}

impl AuthzError {
    pub fn permission_denied(permission: impl Into<String>) -> Self {
        Self::PermissionDenied {
            permission: permission.into(),
        }
    }

    pub(crate) fn store_unavailable(err: DbError) -> Self {
        tracing::error!(error = %err, "Authorization store lookup failed, denying");
        Self::StoreUnavailable(err)
    }
}

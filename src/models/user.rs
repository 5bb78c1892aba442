use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{
    role::RoleRef,
    validators::{deserialize_optional_field, validate_username},
};

/// A user account.
///
/// Users are soft-deleted: `deleted_at` is set and the row is kept so audit
/// entries and rule provenance keep resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub is_active: bool,
    /// The user's single role, if assigned
    pub role: Option<RoleRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A user row together with its password hash. Never serialized.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    #[validate(length(min = 3, max = 64), custom(function = "validate_username"))]
    pub username: String,

    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,

    #[validate(length(min = 1, max = 255))]
    #[serde(default)]
    pub display_name: Option<String>,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    /// Role to assign on creation
    #[serde(default)]
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUser {
    /// Set to null to remove
    #[validate(email)]
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub email: Option<Option<String>>,

    /// Set to null to remove
    #[validate(length(min = 1, max = 255))]
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub display_name: Option<Option<String>>,

    /// Deactivating a user revokes all of their sessions.
    pub is_active: Option<bool>,
}

/// Assign (or clear, with `null`) the user's role.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetUserRole {
    pub role_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPassword {
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Query parameters for listing users.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserQuery {
    pub role_id: Option<Uuid>,
    pub is_active: Option<bool>,
    /// Include soft-deleted users
    #[serde(default)]
    pub include_deleted: bool,
}

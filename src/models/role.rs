use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{deserialize_optional_field, validate_role_name};

/// A named bundle of functional permissions.
///
/// `hierarchy_level` orders roles for display only; it plays no part in
/// authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub hierarchy_level: i32,
    /// Seeded roles cannot be modified or deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    pub fn to_ref(&self) -> RoleRef {
        RoleRef {
            id: self.id,
            name: self.name.clone(),
        }
    }
}

/// Role identity as embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: Uuid,
    pub name: String,
}

/// A role together with its granted permission names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRole {
    #[validate(length(min = 1, max = 64), custom(function = "validate_role_name"))]
    pub name: String,

    #[validate(length(min = 1, max = 128))]
    pub display_name: String,

    #[validate(length(max = 1024))]
    #[serde(default)]
    pub description: Option<String>,

    /// Custom roles rank below the seeded administrator tier.
    #[validate(range(min = 0, max = 99))]
    #[serde(default = "default_hierarchy_level")]
    pub hierarchy_level: i32,

    /// Initial permission grants, checked against the catalogue.
    #[serde(default)]
    pub permissions: Vec<String>,
}

fn default_hierarchy_level() -> i32 {
    10
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRole {
    #[validate(length(min = 1, max = 128))]
    pub display_name: Option<String>,

    /// Set to null to remove
    #[validate(length(max = 1024))]
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub description: Option<Option<String>>,

    #[validate(range(min = 0, max = 99))]
    pub hierarchy_level: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetRolePermissions {
    #[validate(length(max = 256))]
    pub permissions: Vec<String>,
}

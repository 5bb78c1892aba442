use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{check_pattern, deserialize_optional_field, validate_pattern};

/// Lowest allowed rule priority.
pub const MIN_RULE_PRIORITY: i32 = -1000;
/// Highest allowed rule priority.
pub const MAX_RULE_PRIORITY: i32 = 1000;

/// Level of data access a rule grants or denies.
///
/// Ordered: `Admin` implies `Write` implies `Read`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    #[default]
    Read,
    Write,
    Admin,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Write => "write",
            AccessType::Admin => "admin",
        }
    }
}

impl std::fmt::Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(AccessType::Read),
            "write" => Ok(AccessType::Write),
            "admin" => Ok(AccessType::Admin),
            _ => Err(format!("Invalid access type: {}", s)),
        }
    }
}

/// The principal a rule is attached to: a role or a single user, never both.
///
/// Serialized as `{"role_id": ..}` or `{"user_id": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSubject {
    #[serde(rename = "role_id")]
    Role(Uuid),
    #[serde(rename = "user_id")]
    User(Uuid),
}

impl RuleSubject {
    pub fn role_id(&self) -> Option<Uuid> {
        match self {
            RuleSubject::Role(id) => Some(*id),
            RuleSubject::User(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            RuleSubject::User(id) => Some(*id),
            RuleSubject::Role(_) => None,
        }
    }

    /// Subject kind, as used in audit log resource types.
    pub fn kind(&self) -> &'static str {
        match self {
            RuleSubject::Role(_) => "role",
            RuleSubject::User(_) => "user",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            RuleSubject::Role(id) | RuleSubject::User(id) => *id,
        }
    }
}

/// A rule definition that fails structural checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleDefinitionError {
    #[error("a rule must name exactly one of role_id or user_id, not both")]
    AmbiguousSubject,

    #[error("a rule must name exactly one of role_id or user_id")]
    MissingSubject,

    #[error("invalid {field}: {reason}")]
    InvalidPattern {
        field: &'static str,
        reason: &'static str,
    },

    #[error("priority {0} is outside the allowed range -1000..=1000")]
    PriorityOutOfRange(i32),
}

/// Loose wire form of a rule subject.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SubjectRef {
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

impl TryFrom<SubjectRef> for RuleSubject {
    type Error = RuleDefinitionError;

    fn try_from(value: SubjectRef) -> Result<Self, Self::Error> {
        match (value.role_id, value.user_id) {
            (Some(role_id), None) => Ok(RuleSubject::Role(role_id)),
            (None, Some(user_id)) => Ok(RuleSubject::User(user_id)),
            (Some(_), Some(_)) => Err(RuleDefinitionError::AmbiguousSubject),
            (None, None) => Err(RuleDefinitionError::MissingSubject),
        }
    }
}

/// A resource-scoped data access rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: Uuid,
    #[serde(flatten)]
    pub subject: RuleSubject,
    /// Storage connection this rule is limited to; `None` applies to all connections.
    pub connection_id: Option<Uuid>,
    pub database_pattern: String,
    pub table_pattern: String,
    pub access_type: AccessType,
    pub is_allowed: bool,
    /// Higher priority wins when several rules match.
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subject-less rule body, used for single creates and bulk replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AccessRuleSpec {
    #[serde(default)]
    pub connection_id: Option<Uuid>,

    #[validate(custom(function = "validate_pattern"))]
    #[serde(default = "default_wildcard")]
    pub database_pattern: String,

    #[validate(custom(function = "validate_pattern"))]
    #[serde(default = "default_wildcard")]
    pub table_pattern: String,

    #[serde(default)]
    pub access_type: AccessType,

    #[serde(default = "default_true")]
    pub is_allowed: bool,

    /// Valid range: -1000 to 1000
    #[validate(range(min = -1000, max = 1000))]
    #[serde(default)]
    pub priority: i32,

    #[validate(length(max = 1024))]
    #[serde(default)]
    pub description: Option<String>,
}

impl Default for AccessRuleSpec {
    fn default() -> Self {
        Self {
            connection_id: None,
            database_pattern: default_wildcard(),
            table_pattern: default_wildcard(),
            access_type: AccessType::default(),
            is_allowed: true,
            priority: 0,
            description: None,
        }
    }
}

impl AccessRuleSpec {
    /// Enforce pattern and priority bounds.
    pub fn check(&self) -> Result<(), RuleDefinitionError> {
        check_pattern(&self.database_pattern).map_err(|reason| {
            RuleDefinitionError::InvalidPattern {
                field: "database_pattern",
                reason,
            }
        })?;
        check_pattern(&self.table_pattern).map_err(|reason| {
            RuleDefinitionError::InvalidPattern {
                field: "table_pattern",
                reason,
            }
        })?;
        check_priority(self.priority)
    }
}

pub(crate) fn check_priority(priority: i32) -> Result<(), RuleDefinitionError> {
    if (MIN_RULE_PRIORITY..=MAX_RULE_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(RuleDefinitionError::PriorityOutOfRange(priority))
    }
}

fn default_wildcard() -> String {
    "*".to_string()
}

fn default_true() -> bool {
    true
}

/// Request to create a single access rule.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccessRule {
    #[serde(flatten)]
    pub subject: SubjectRef,

    #[serde(flatten)]
    #[validate(nested)]
    pub rule: AccessRuleSpec,
}

/// Request to update an access rule. The subject cannot be changed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAccessRule {
    /// Set to null to make the rule apply to all connections
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub connection_id: Option<Option<Uuid>>,

    #[validate(custom(function = "validate_pattern"))]
    pub database_pattern: Option<String>,

    #[validate(custom(function = "validate_pattern"))]
    pub table_pattern: Option<String>,

    pub access_type: Option<AccessType>,

    pub is_allowed: Option<bool>,

    #[validate(range(min = -1000, max = 1000))]
    pub priority: Option<i32>,

    #[validate(length(max = 1024))]
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub description: Option<Option<String>>,
}

impl UpdateAccessRule {
    pub fn check(&self) -> Result<(), RuleDefinitionError> {
        if let Some(p) = &self.database_pattern {
            check_pattern(p).map_err(|reason| RuleDefinitionError::InvalidPattern {
                field: "database_pattern",
                reason,
            })?;
        }
        if let Some(p) = &self.table_pattern {
            check_pattern(p).map_err(|reason| RuleDefinitionError::InvalidPattern {
                field: "table_pattern",
                reason,
            })?;
        }
        if let Some(priority) = self.priority {
            check_priority(priority)?;
        }
        Ok(())
    }

    /// Apply this update on top of an existing rule body.
    pub fn apply_to(&self, rule: &AccessRule) -> AccessRuleSpec {
        AccessRuleSpec {
            connection_id: self.connection_id.unwrap_or(rule.connection_id),
            database_pattern: self
                .database_pattern
                .clone()
                .unwrap_or_else(|| rule.database_pattern.clone()),
            table_pattern: self
                .table_pattern
                .clone()
                .unwrap_or_else(|| rule.table_pattern.clone()),
            access_type: self.access_type.unwrap_or(rule.access_type),
            is_allowed: self.is_allowed.unwrap_or(rule.is_allowed),
            priority: self.priority.unwrap_or(rule.priority),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| rule.description.clone()),
        }
    }
}

/// Full replacement of the rule set for one role or user.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetAccessRules {
    #[validate(nested)]
    pub rules: Vec<AccessRuleSpec>,
}

/// Query parameters for listing access rules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessRuleQuery {
    pub role_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub connection_id: Option<Uuid>,
}

/// A data resource an access decision is made about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(default)]
    pub connection_id: Option<Uuid>,
    pub database: String,
    #[serde(default)]
    pub table: Option<String>,
}

impl ResourceRef {
    pub fn database(database: impl Into<String>) -> Self {
        Self {
            connection_id: None,
            database: database.into(),
            table: None,
        }
    }

    pub fn table(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            connection_id: None,
            database: database.into(),
            table: Some(table.into()),
        }
    }

    pub fn on_connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    /// `database` or `database.table`, for messages and audit entries.
    pub fn display_name(&self) -> String {
        match &self.table {
            Some(table) => format!("{}.{}", self.database, table),
            None => self.database.clone(),
        }
    }
}

/// Request to check access to one resource for the calling principal.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AccessCheckRequest {
    #[serde(flatten)]
    pub resource: ResourceRef,
    #[serde(default)]
    pub access_type: AccessType,
}

/// Request to filter a database listing.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FilterDatabasesRequest {
    #[serde(default)]
    pub connection_id: Option<Uuid>,
    #[validate(length(max = 10000))]
    pub databases: Vec<String>,
}

/// Request to filter a table listing within one database.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct FilterTablesRequest {
    #[serde(default)]
    pub connection_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub database: String,
    #[validate(length(max = 10000))]
    pub tables: Vec<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_access_type_ordering() {
        assert!(AccessType::Admin > AccessType::Write);
        assert!(AccessType::Write > AccessType::Read);
        assert_eq!("write".parse::<AccessType>().unwrap(), AccessType::Write);
        assert!("execute".parse::<AccessType>().is_err());
    }

    #[test]
    fn test_subject_requires_exactly_one() {
        let role = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert_eq!(
            RuleSubject::try_from(SubjectRef {
                role_id: Some(role),
                user_id: None
            }),
            Ok(RuleSubject::Role(role))
        );
        assert_eq!(
            RuleSubject::try_from(SubjectRef {
                role_id: None,
                user_id: Some(user)
            }),
            Ok(RuleSubject::User(user))
        );
        assert_eq!(
            RuleSubject::try_from(SubjectRef {
                role_id: Some(role),
                user_id: Some(user)
            }),
            Err(RuleDefinitionError::AmbiguousSubject)
        );
        assert_eq!(
            RuleSubject::try_from(SubjectRef::default()),
            Err(RuleDefinitionError::MissingSubject)
        );
    }

    #[test]
    fn test_create_rule_defaults() {
        let role = Uuid::new_v4();
        let input: CreateAccessRule = serde_json::from_value(json!({ "role_id": role })).unwrap();

        assert_eq!(input.subject.role_id, Some(role));
        assert_eq!(input.rule.database_pattern, "*");
        assert_eq!(input.rule.table_pattern, "*");
        assert_eq!(input.rule.access_type, AccessType::Read);
        assert!(input.rule.is_allowed);
        assert_eq!(input.rule.priority, 0);
    }

    #[test]
    fn test_spec_check_rejects_out_of_bounds() {
        let spec = AccessRuleSpec {
            priority: 1001,
            ..Default::default()
        };
        assert_eq!(
            spec.check(),
            Err(RuleDefinitionError::PriorityOutOfRange(1001))
        );

        let spec = AccessRuleSpec {
            table_pattern: "my table".into(),
            ..Default::default()
        };
        assert!(matches!(
            spec.check(),
            Err(RuleDefinitionError::InvalidPattern {
                field: "table_pattern",
                ..
            })
        ));
    }

    #[test]
    fn test_rule_serializes_subject_as_id_field() {
        let role = Uuid::new_v4();
        let rule = AccessRule {
            id: Uuid::new_v4(),
            subject: RuleSubject::Role(role),
            connection_id: None,
            database_pattern: "sales".into(),
            table_pattern: "*".into(),
            access_type: AccessType::Read,
            is_allowed: true,
            priority: 0,
            description: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["role_id"], json!(role));
        assert!(value.get("user_id").is_none());
        assert_eq!(value["access_type"], "read");
    }

    #[test]
    fn test_update_applies_explicit_null() {
        let conn = Uuid::new_v4();
        let rule = AccessRule {
            id: Uuid::new_v4(),
            subject: RuleSubject::User(Uuid::new_v4()),
            connection_id: Some(conn),
            database_pattern: "sales".into(),
            table_pattern: "orders".into(),
            access_type: AccessType::Write,
            is_allowed: false,
            priority: 50,
            description: Some("legacy".into()),
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let update: UpdateAccessRule =
            serde_json::from_value(json!({ "connection_id": null, "priority": 10 })).unwrap();
        let spec = update.apply_to(&rule);

        assert_eq!(spec.connection_id, None);
        assert_eq!(spec.priority, 10);
        assert_eq!(spec.table_pattern, "orders");
        assert_eq!(spec.description.as_deref(), Some("legacy"));
    }

    #[test]
    fn test_resource_display_name() {
        assert_eq!(ResourceRef::database("sales").display_name(), "sales");
        assert_eq!(
            ResourceRef::table("sales", "orders").display_name(),
            "sales.orders"
        );
    }
}

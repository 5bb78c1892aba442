//! The functional permission catalogue and the system roles built from it.
//!
//! Permissions are data. Adding one means adding a row here (and granting it
//! to roles); no evaluator logic changes. The catalogue is synchronized into
//! the store on startup, and retired names are removed along with their grants.

use crate::{db::repos::SystemRoleSeed, models::Permission};

/// Bumped whenever the catalogue or the system role seeds change.
pub const CATALOG_VERSION: u32 = 1;

pub const USERS_VIEW: &str = "users:view";
pub const USERS_CREATE: &str = "users:create";
pub const USERS_UPDATE: &str = "users:update";
pub const USERS_DELETE: &str = "users:delete";
pub const ROLES_VIEW: &str = "roles:view";
pub const ROLES_CREATE: &str = "roles:create";
pub const ROLES_UPDATE: &str = "roles:update";
pub const ROLES_DELETE: &str = "roles:delete";
pub const ROLES_ASSIGN: &str = "roles:assign";
pub const ACCESS_RULES_VIEW: &str = "access_rules:view";
pub const ACCESS_RULES_MANAGE: &str = "access_rules:manage";
pub const CONNECTIONS_VIEW: &str = "connections:view";
pub const CONNECTIONS_MANAGE: &str = "connections:manage";
pub const DATABASE_BROWSE: &str = "database:browse";
pub const QUERY_EXECUTE: &str = "query:execute";
pub const QUERY_WRITE: &str = "query:write";
pub const QUERY_DDL: &str = "query:ddl";
pub const AUDIT_VIEW: &str = "audit:view";

/// `(name, category, description)`
pub const PERMISSION_CATALOG: &[(&str, &str, &str)] = &[
    (USERS_VIEW, "users", "View user accounts"),
    (USERS_CREATE, "users", "Create user accounts"),
    (USERS_UPDATE, "users", "Update user accounts and reset passwords"),
    (USERS_DELETE, "users", "Delete user accounts"),
    (ROLES_VIEW, "roles", "View roles and their permissions"),
    (ROLES_CREATE, "roles", "Create custom roles"),
    (ROLES_UPDATE, "roles", "Update custom roles and their permissions"),
    (ROLES_DELETE, "roles", "Delete custom roles"),
    (ROLES_ASSIGN, "roles", "Assign roles to users"),
    (ACCESS_RULES_VIEW, "access_rules", "View data access rules"),
    (ACCESS_RULES_MANAGE, "access_rules", "Create, update, replace and delete data access rules"),
    (CONNECTIONS_VIEW, "connections", "View storage cluster connections"),
    (CONNECTIONS_MANAGE, "connections", "Register and remove storage cluster connections"),
    (DATABASE_BROWSE, "database", "List databases and tables visible to the caller"),
    (QUERY_EXECUTE, "query", "Execute read-only queries"),
    (QUERY_WRITE, "query", "Execute queries that modify data"),
    (QUERY_DDL, "query", "Execute DDL statements"),
    (AUDIT_VIEW, "audit", "View the audit log"),
];

/// The catalogue as model values.
pub fn catalog() -> Vec<Permission> {
    PERMISSION_CATALOG
        .iter()
        .map(|(name, category, description)| Permission {
            name: name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn is_known(permission: &str) -> bool {
    PERMISSION_CATALOG.iter().any(|(name, _, _)| *name == permission)
}

/// Seeds for the immutable system roles, highest tier first.
pub fn system_roles() -> Vec<SystemRoleSeed> {
    vec![
        SystemRoleSeed {
            name: "admin",
            display_name: "Administrator",
            description: "Full access to administration and all data",
            hierarchy_level: 100,
            permissions: PERMISSION_CATALOG.iter().map(|(name, _, _)| *name).collect(),
        },
        SystemRoleSeed {
            name: "developer",
            display_name: "Developer",
            description: "Read administration data, run any query including DDL",
            hierarchy_level: 80,
            permissions: vec![
                USERS_VIEW,
                ROLES_VIEW,
                ACCESS_RULES_VIEW,
                CONNECTIONS_VIEW,
                DATABASE_BROWSE,
                QUERY_EXECUTE,
                QUERY_WRITE,
                QUERY_DDL,
            ],
        },
        SystemRoleSeed {
            name: "analyst",
            display_name: "Analyst",
            description: "Browse and query data permitted by access rules",
            hierarchy_level: 60,
            permissions: vec![CONNECTIONS_VIEW, DATABASE_BROWSE, QUERY_EXECUTE],
        },
        SystemRoleSeed {
            name: "viewer",
            display_name: "Viewer",
            description: "Browse databases and tables permitted by access rules",
            hierarchy_level: 40,
            permissions: vec![CONNECTIONS_VIEW, DATABASE_BROWSE],
        },
        SystemRoleSeed {
            name: "guest",
            display_name: "Guest",
            description: "Authenticated with no functional permissions",
            hierarchy_level: 20,
            permissions: vec![],
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let names: HashSet<&str> = PERMISSION_CATALOG.iter().map(|(n, _, _)| *n).collect();
        assert_eq!(names.len(), PERMISSION_CATALOG.len());
    }

    #[test]
    fn test_catalog_names_are_namespaced() {
        for (name, category, _) in PERMISSION_CATALOG {
            assert_eq!(name.split(':').next(), Some(*category), "{}", name);
        }
    }

    #[test]
    fn test_system_roles_only_grant_known_permissions() {
        for seed in system_roles() {
            for permission in &seed.permissions {
                assert!(is_known(permission), "{} grants unknown {}", seed.name, permission);
            }
        }
    }

    #[test]
    fn test_system_roles_are_ordered_by_tier() {
        let levels: Vec<i32> = system_roles().iter().map(|s| s.hierarchy_level).collect();
        let mut sorted = levels.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(levels, sorted);
        assert_eq!(system_roles()[0].permissions.len(), PERMISSION_CATALOG.len());
    }
}

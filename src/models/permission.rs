use serde::{Deserialize, Serialize};

/// A functional capability, e.g. `users:create`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub category: String,
    pub description: String,
}

/// Permissions grouped for presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionCategory {
    pub category: String,
    pub permissions: Vec<Permission>,
}

/// Group permissions by category, keeping first-seen category order.
pub fn group_by_category(permissions: impl IntoIterator<Item = Permission>) -> Vec<PermissionCategory> {
    let mut groups: Vec<PermissionCategory> = Vec::new();
    for permission in permissions {
        match groups.iter_mut().find(|g| g.category == permission.category) {
            Some(group) => group.permissions.push(permission),
            None => groups.push(PermissionCategory {
                category: permission.category.clone(),
                permissions: vec![permission],
            }),
        }
    }
    groups
}

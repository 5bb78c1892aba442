mod access_rules;
mod audit_logs;
mod common;
mod connections;
mod roles;
mod sessions;
mod users;

pub use access_rules::SqliteAccessRuleRepo;
pub use audit_logs::SqliteAuditLogRepo;
pub use connections::SqliteConnectionRepo;
pub use roles::SqliteRoleRepo;
pub use sessions::SqliteSessionRepo;
pub use users::SqliteUserRepo;

mod access_rule;
mod audit_log;
mod connection;
mod permission;
mod role;
mod session;
mod user;
mod validators;

pub use access_rule::*;
pub use audit_log::*;
pub use connection::*;
pub use permission::*;
pub use role::*;
pub use session::*;
pub use user::*;
pub use validators::{MAX_PATTERN_LENGTH, check_pattern};

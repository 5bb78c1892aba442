//! Authorization core.
//!
//! Two independent models are combined:
//! - Functional permissions from a fixed catalogue, granted to roles. The
//!   access token carries a snapshot; [`PermissionResolver`] uses it as an
//!   optimistic allow and confirms misses against the store.
//! - Resource-scoped access rules over `(connection, database, table)`,
//!   attached to a role or a user and resolved by [`ResourceAccessEvaluator`].
//!
//! Every evaluation re-reads rules from the store. Store failures deny.

mod error;
mod evaluator;
pub mod pattern;
pub mod permissions;
mod resolver;

pub use error::AuthzError;
pub use evaluator::{AccessDecision, Decision, DecisionReason, ResourceAccessEvaluator, decide};
pub use permissions::{CATALOG_VERSION, PERMISSION_CATALOG, catalog, system_roles};
pub use resolver::PermissionResolver;

#[cfg(test)]
pub(crate) mod test_support;

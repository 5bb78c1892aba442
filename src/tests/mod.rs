//! End-to-end tests over the full router.
//!
//! Each test builds the app on a fresh in-memory SQLite store with the
//! permission catalogue synced, the system roles seeded and a bootstrap
//! administrator, then drives it with `oneshot` requests.

#[cfg(all(test, feature = "database-sqlite"))]
mod http_e2e;

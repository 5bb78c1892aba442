use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Minimum HMAC secret length in bytes.
const MIN_SECRET_LEN: usize = 32;

/// Upper bound on `access_token_ttl_secs` (1 day).
pub const MAX_ACCESS_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Upper bound on `refresh_token_ttl_secs` (1 year).
pub const MAX_REFRESH_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Authentication and authorization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Access token signing and session lifetimes.
    pub tokens: TokenConfig,

    /// Role names that skip resource-rule evaluation entirely.
    ///
    /// A principal holding any of these roles is granted every data access
    /// without a rule lookup. Functional permission checks still apply.
    #[serde(default = "default_bypass_roles")]
    pub bypass_roles: Vec<String>,

    /// Audit logging configuration for authorization decisions.
    #[serde(default)]
    pub audit: AuthzAuditConfig,

    /// Administrator created on startup when the user table is empty.
    #[serde(default)]
    pub bootstrap: Option<BootstrapAdminConfig>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tokens.validate()?;

        if self.bypass_roles.iter().any(|r| r.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "auth.bypass_roles cannot contain empty role names".into(),
            ));
        }

        if let Some(bootstrap) = &self.bootstrap {
            bootstrap.validate()?;
        }

        Ok(())
    }

    /// Whether the given role name is configured as a bypass role.
    pub fn is_bypass_role(&self, role_name: &str) -> bool {
        self.bypass_roles.iter().any(|r| r == role_name)
    }
}

fn default_bypass_roles() -> Vec<String> {
    vec!["admin".to_string()]
}

/// Access token and refresh session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenConfig {
    /// Shared HMAC signing key. Must be at least 32 bytes.
    ///
    /// Example: `secret = "${COLONNADE_TOKEN_SECRET}"`
    pub secret: String,

    /// Signing algorithm.
    #[serde(default)]
    pub algorithm: TokenAlgorithm,

    /// Value of the `iss` claim, checked on verification.
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_secs: u64,

    /// Refresh session lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_secs: u64,

    /// Clock skew tolerance applied to `exp` in seconds.
    #[serde(default)]
    pub leeway_secs: u64,
}

impl TokenConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "auth.tokens.secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }
        if self.access_token_ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.tokens.access_token_ttl_secs must be greater than zero".into(),
            ));
        }
        if self.refresh_token_ttl_secs < self.access_token_ttl_secs {
            return Err(ConfigError::Validation(
                "auth.tokens.refresh_token_ttl_secs must not be shorter than the access token lifetime"
                    .into(),
            ));
        }
        self.access_ttl()?;
        self.refresh_ttl()?;
        Ok(())
    }

    /// Access token lifetime, bounded by [`MAX_ACCESS_TOKEN_TTL_SECS`].
    pub fn access_ttl(&self) -> Result<Duration, ConfigError> {
        bounded_ttl(
            "auth.tokens.access_token_ttl_secs",
            self.access_token_ttl_secs,
            MAX_ACCESS_TOKEN_TTL_SECS,
        )
    }

    /// Refresh session lifetime, bounded by [`MAX_REFRESH_TOKEN_TTL_SECS`].
    pub fn refresh_ttl(&self) -> Result<Duration, ConfigError> {
        bounded_ttl(
            "auth.tokens.refresh_token_ttl_secs",
            self.refresh_token_ttl_secs,
            MAX_REFRESH_TOKEN_TTL_SECS,
        )
    }
}

fn bounded_ttl(field: &str, secs: u64, max: u64) -> Result<Duration, ConfigError> {
    if secs > max {
        return Err(ConfigError::Validation(format!(
            "{field} must not exceed {max} seconds"
        )));
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ConfigError::Validation(format!("{field} is out of range")))
}

fn default_issuer() -> String {
    "colonnade".to_string()
}

fn default_access_ttl() -> u64 {
    900 // 15 minutes
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 60 * 60 // 7 days
}

/// HMAC signing algorithm for access tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenAlgorithm {
    /// HMAC with SHA-256
    #[default]
    HS256,
    /// HMAC with SHA-384
    HS384,
    /// HMAC with SHA-512
    HS512,
}

impl TokenAlgorithm {
    /// Convert to jsonwebtoken Algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            TokenAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            TokenAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            TokenAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
        }
    }
}

/// Which authorization decisions are written to the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthzAuditConfig {
    /// Log allowed authorization decisions.
    /// Defaults to false (only denied decisions are logged).
    #[serde(default)]
    pub log_allowed: bool,

    /// Log denied authorization decisions.
    /// Defaults to true for security monitoring.
    #[serde(default = "default_true")]
    pub log_denied: bool,
}

impl Default for AuthzAuditConfig {
    fn default() -> Self {
        Self {
            log_allowed: false,
            log_denied: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Initial administrator account.
///
/// Only applied when the database has no users, so it is safe to leave in
/// place after the first start.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapAdminConfig {
    pub username: String,

    /// Example: `password = "${COLONNADE_BOOTSTRAP_PASSWORD}"`
    pub password: String,

    #[serde(default)]
    pub email: Option<String>,
}

impl BootstrapAdminConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Validation(
                "auth.bootstrap.username cannot be empty".into(),
            ));
        }
        if self.password.len() < 8 {
            return Err(ConfigError::Validation(
                "auth.bootstrap.password must be at least 8 characters".into(),
            ));
        }
        Ok(())
    }
}

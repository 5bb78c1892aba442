use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use serde::Deserialize;
use validator::ValidationError;

/// Usernames: letters, digits, `.`, `_` and `-`.
pub static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("username regex is valid"));

/// Role names: lowercase identifier starting with a letter.
pub static ROLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("role name regex is valid"));

/// Maximum length of a database or table pattern.
pub const MAX_PATTERN_LENGTH: usize = 255;

/// Check a database/table glob pattern.
///
/// Patterns are 1..=255 characters with no whitespace and no control characters.
pub fn check_pattern(pattern: &str) -> Result<(), &'static str> {
    if pattern.is_empty() {
        return Err("pattern cannot be empty");
    }
    if pattern.chars().count() > MAX_PATTERN_LENGTH {
        return Err("pattern cannot exceed 255 characters");
    }
    if pattern.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err("pattern cannot contain whitespace or control characters");
    }
    Ok(())
}

pub fn validate_pattern(pattern: &str) -> Result<(), ValidationError> {
    check_pattern(pattern).map_err(|reason| {
        let mut err = ValidationError::new("invalid_pattern");
        err.message = Some(Cow::Borrowed(reason));
        err
    })
}

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if USERNAME_REGEX.is_match(username) {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_username");
    err.message = Some(Cow::Borrowed(
        "Username may only contain letters, digits, '.', '_' and '-'",
    ));
    Err(err)
}

pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    if ROLE_NAME_REGEX.is_match(name) {
        return Ok(());
    }
    let mut err = ValidationError::new("invalid_role_name");
    err.message = Some(Cow::Borrowed(
        "Role names must start with a lowercase letter and contain only a-z, 0-9, '_' and '-'",
    ));
    Err(err)
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn deserialize_optional_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

//! Opaque refresh tokens.
//!
//! Format: `cln_rt_` followed by 32 random bytes in URL-safe base64. Only the
//! SHA-256 hex digest is ever persisted.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

pub const REFRESH_TOKEN_PREFIX: &str = "cln_rt_";

/// A newly generated refresh token and the hash to store.
#[derive(Debug, Clone)]
pub struct GeneratedRefreshToken {
    pub token: String,
    pub hash: String,
}

pub fn generate() -> GeneratedRefreshToken {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = format!("{}{}", REFRESH_TOKEN_PREFIX, URL_SAFE_NO_PAD.encode(bytes));
    let hash = hash(&token);
    GeneratedRefreshToken { token, hash }
}

pub fn hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cheap shape check before any store lookup.
pub fn is_well_formed(token: &str) -> bool {
    token
        .strip_prefix(REFRESH_TOKEN_PREFIX)
        .is_some_and(|rest| rest.len() == 43 && URL_SAFE_NO_PAD.decode(rest).is_ok())
}

/// Constant-time comparison of a presented token against a stored hash.
pub fn matches_hash(token: &str, stored_hash: &str) -> bool {
    hash(token).as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

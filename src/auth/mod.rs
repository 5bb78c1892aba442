//! Authentication: signed access tokens, refresh tokens and password hashing.

mod error;
pub mod password;
mod principal;
pub mod refresh_token;
pub mod token;

pub use error::AuthError;
pub use principal::Principal;
#[cfg(test)]
pub(crate) use principal::test_support;
pub use token::{AccessClaims, IssuedToken, TokenError, TokenSigner, TokenVerifier, VerifiedToken};

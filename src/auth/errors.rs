//! Token lifecycle errors.

use crate::jwt::JwtError;

/// Why a token could not be used.
///
/// Every variant surfaces as 401 on the auth path, but the variants stay
/// distinct so callers can tell an expired session from a forged token.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Refresh token not found")]
    RefreshNotFound(i64),
    #[error("Failed to sign token")]
    Signing(#[source] JwtError),
    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<JwtError> for TokenError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => TokenError::Expired,
            JwtError::Encoding(_) => TokenError::Signing(e),
            JwtError::Decoding(_) | JwtError::WrongTokenType => TokenError::Invalid,
        }
    }
}

//! JWT token generation and validation.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::UserRole;

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived, stateless
    Access,
    /// Long-lived, stored per user
    Refresh,
}

/// JWT claims for access tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// JWT claims for refresh tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID
    pub jti: String,
    /// Subject (user ID)
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
}

/// Default access token lifetime: 1 hour
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Default refresh token lifetime: 2 weeks
pub const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 14 * 24 * 60 * 60;

/// Longest accepted token lifetime: 10 years
pub const MAX_TOKEN_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Signing keys and token lifetimes.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
}

/// A freshly signed refresh token.
#[derive(Debug, Clone)]
pub struct RefreshTokenResult {
    pub token: String,
    pub jti: String,
    pub issued_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl JwtConfig {
    /// Create a configuration with the default token lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(
            secret,
            DEFAULT_ACCESS_TOKEN_TTL_SECS,
            DEFAULT_REFRESH_TOKEN_TTL_SECS,
        )
    }

    /// Lifetimes are clamped to `±MAX_TOKEN_TTL_SECS`. Negative values mint
    /// tokens that are already expired.
    pub fn with_ttl(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        let ttl =
            |secs: i64| TimeDelta::seconds(secs.clamp(-MAX_TOKEN_TTL_SECS, MAX_TOKEN_TTL_SECS));
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_ttl: ttl(access_ttl_secs),
            refresh_ttl: ttl(refresh_ttl_secs),
        }
    }

    /// Sign an access token carrying the user's identity.
    pub fn generate_access_token(
        &self,
        user_id: i64,
        email: &str,
        name: &str,
        role: UserRole,
    ) -> Result<String, JwtError> {
        let now = Utc::now();

        let claims = AccessClaims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            role,
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Sign a refresh token. The caller is responsible for storing it.
    pub fn generate_refresh_token(&self, user_id: i64) -> Result<RefreshTokenResult, JwtError> {
        let now = Utc::now();
        let exp = now + self.refresh_ttl;
        let jti = uuid::Uuid::new_v4().to_string();

        let claims = RefreshClaims {
            jti: jti.clone(),
            sub: user_id.to_string(),
            token_type: TokenType::Refresh,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(JwtError::Encoding)?;

        Ok(RefreshTokenResult {
            token,
            jti,
            issued_at: whole_seconds(now),
            expires_at: whole_seconds(exp),
        })
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let claims: AccessClaims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Validate and decode a refresh token.
    pub fn validate_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let claims: RefreshClaims = self.decode(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        jsonwebtoken::decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Decoding(e),
            })
    }
}

fn whole_seconds(dt: DateTime<Utc>) -> NaiveDateTime {
    DateTime::from_timestamp(dt.timestamp(), 0)
        .unwrap_or(dt)
        .naive_utc()
}

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(#[source] jsonwebtoken::errors::Error),
    #[error("Token has expired")]
    Expired,
    /// Refresh token used as access token or the reverse
    #[error("Wrong token type")]
    WrongTokenType,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-for-testing-0123456789";

    #[test]
    fn test_generate_and_validate_access_token() {
        let config = JwtConfig::new(SECRET);

        let token = config
            .generate_access_token(42, "alice@example.com", "Alice", UserRole::Admin)
            .unwrap();
        let claims = config.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.name, "Alice");
        assert_eq!(claims.role, UserRole::Admin);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(claims.exp - claims.iat, DEFAULT_ACCESS_TOKEN_TTL_SECS);
    }

    #[test]
    fn test_refresh_token_has_unique_jti() {
        let config = JwtConfig::new(SECRET);

        let a = config.generate_refresh_token(1).unwrap();
        let b = config.generate_refresh_token(1).unwrap();
        assert_ne!(a.jti, b.jti);

        let claims = config.validate_refresh_token(&a.token).unwrap();
        assert_eq!(claims.jti, a.jti);
        assert_eq!(claims.sub, "1");
        assert_eq!(
            (a.expires_at - a.issued_at).num_seconds(),
            DEFAULT_REFRESH_TOKEN_TTL_SECS
        );
    }

    #[test]
    fn test_wrong_token_type_rejected() {
        let config = JwtConfig::new(SECRET);

        let refresh = config.generate_refresh_token(1).unwrap();
        assert!(matches!(
            config.validate_access_token(&refresh.token),
            Err(JwtError::Decoding(_)) | Err(JwtError::WrongTokenType)
        ));

        let access = config
            .generate_access_token(1, "a@example.com", "A", UserRole::User)
            .unwrap();
        assert!(matches!(
            config.validate_refresh_token(&access),
            Err(JwtError::Decoding(_)) | Err(JwtError::WrongTokenType)
        ));
    }

    #[test]
    fn test_invalid_token() {
        let config = JwtConfig::new(SECRET);
        assert!(matches!(
            config.validate_access_token("not.a.token"),
            Err(JwtError::Decoding(_))
        ));
    }

    #[test]
    fn test_wrong_secret() {
        let config1 = JwtConfig::new(SECRET);
        let config2 = JwtConfig::new(b"another-secret-key-for-testing-9876543210");

        let token = config1
            .generate_access_token(1, "a@example.com", "A", UserRole::User)
            .unwrap();
        assert!(matches!(
            config2.validate_access_token(&token),
            Err(JwtError::Decoding(_))
        ));
    }

    #[test]
    fn test_expired_token_is_distinct() {
        let config = JwtConfig::new(SECRET);

        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub: "1".to_string(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
            role: UserRole::User,
            token_type: TokenType::Access,
            iat: now - 120,
            exp: now - 60,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(matches!(
            config.validate_access_token(&token),
            Err(JwtError::Expired)
        ));
    }

    #[test]
    fn test_out_of_range_ttl_is_clamped() {
        let config = JwtConfig::with_ttl(SECRET, i64::MAX, i64::MIN);

        let token = config
            .generate_access_token(1, "alice@example.com", "Alice", UserRole::User)
            .unwrap();
        let claims = config.validate_access_token(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_TOKEN_TTL_SECS);

        assert!(config.generate_refresh_token(1).is_ok());
    }
}

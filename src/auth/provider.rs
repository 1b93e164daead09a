//! Access and refresh token lifecycle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use super::errors::TokenError;
use super::principal::Principal;
use crate::db::{Database, User, from_db_timestamp};
use crate::jwt::JwtConfig;

/// Issues and validates tokens. The only owner of refresh token storage.
#[derive(Clone)]
pub struct TokenProvider {
    jwt: Arc<JwtConfig>,
    db: Database,
}

impl TokenProvider {
    pub fn new(jwt: Arc<JwtConfig>, db: Database) -> Self {
        Self { jwt, db }
    }

    /// Sign an access token for `user` and store a fresh refresh token,
    /// replacing any previous one. Returns the access token.
    pub async fn create_full_tokens(&self, user: &User) -> Result<String, TokenError> {
        let access = self
            .jwt
            .generate_access_token(user.id, &user.email, &user.name, user.role)?;
        let refresh = self.jwt.generate_refresh_token(user.id)?;

        self.db
            .refresh_tokens()
            .upsert(
                user.id,
                &refresh.jti,
                &refresh.token,
                refresh.issued_at,
                refresh.expires_at,
            )
            .await?;

        debug!(user_id = user.id, jti = %refresh.jti, "Issued tokens");
        Ok(access)
    }

    /// Check signature, type and expiry of an access token.
    pub fn validate_token(&self, token: &str) -> Result<(), TokenError> {
        self.jwt.validate_access_token(token)?;
        Ok(())
    }

    /// Parse an access token into the identity it carries.
    pub fn get_authentication(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self.jwt.validate_access_token(token)?;
        Principal::try_from(claims)
    }

    /// Mint a new access token from the principal's stored refresh token.
    ///
    /// The user is reloaded so the new token reflects the current name and role.
    pub async fn refresh_access_token(&self, principal: &Principal) -> Result<String, TokenError> {
        let stored = self
            .db
            .refresh_tokens()
            .get(principal.user_id)
            .await?
            .ok_or(TokenError::RefreshNotFound(principal.user_id))?;

        let expires_at = from_db_timestamp(&stored.expires_at).ok_or(TokenError::Invalid)?;
        if expires_at <= Utc::now().naive_utc() {
            return Err(TokenError::Expired);
        }

        let claims = self.jwt.validate_refresh_token(&stored.token)?;
        if claims.sub != principal.user_id.to_string() || claims.jti != stored.jti {
            warn!(user_id = principal.user_id, "Stored refresh token does not match its owner");
            return Err(TokenError::Invalid);
        }

        let user = self
            .db
            .users()
            .get_by_id(principal.user_id)
            .await?
            .ok_or(TokenError::RefreshNotFound(principal.user_id))?;

        let token = self
            .jwt
            .generate_access_token(user.id, &user.email, &user.name, user.role)?;
        Ok(token)
    }

    /// Remove the user's refresh token. Removing a missing token is not an error.
    pub async fn delete_refresh_token(&self, user_id: i64) -> Result<(), TokenError> {
        let existed = self.db.refresh_tokens().delete(user_id).await?;
        debug!(user_id, existed, "Deleted refresh token");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UserRole;
    use chrono::TimeDelta;

    const SECRET: &[u8] = b"provider-test-secret-0123456789abcdef";

    async fn setup() -> (TokenProvider, Database, User) {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .users()
            .create("alice@example.com", "hash", "Alice", UserRole::User)
            .await
            .unwrap();
        let user = db.users().get_by_id(id).await.unwrap().unwrap();
        let provider = TokenProvider::new(Arc::new(JwtConfig::new(SECRET)), db.clone());
        (provider, db, user)
    }

    #[tokio::test]
    async fn test_full_tokens_then_refresh() {
        let (provider, db, user) = setup().await;

        let access = provider.create_full_tokens(&user).await.unwrap();
        assert!(!access.is_empty());
        assert!(db.refresh_tokens().get(user.id).await.unwrap().is_some());

        let principal = provider.get_authentication(&access).unwrap();
        assert_eq!(principal, Principal::from(&user));

        let refreshed = provider.refresh_access_token(&principal).await.unwrap();
        assert!(!refreshed.is_empty());
        provider.validate_token(&refreshed).unwrap();
    }

    #[tokio::test]
    async fn test_refresh_reflects_current_user() {
        let (provider, db, user) = setup().await;

        let access = provider.create_full_tokens(&user).await.unwrap();
        let principal = provider.get_authentication(&access).unwrap();

        db.users().update_name(user.id, "Alicia").await.unwrap();

        let refreshed = provider.refresh_access_token(&principal).await.unwrap();
        let principal = provider.get_authentication(&refreshed).unwrap();
        assert_eq!(principal.name, "Alicia");
    }

    #[tokio::test]
    async fn test_refresh_without_stored_token_is_not_found() {
        let (provider, _, user) = setup().await;

        let result = provider
            .refresh_access_token(&Principal::from(&user))
            .await;
        assert!(matches!(result, Err(TokenError::RefreshNotFound(id)) if id == user.id));
    }

    #[tokio::test]
    async fn test_refresh_with_expired_stored_token() {
        let (provider, db, user) = setup().await;
        provider.create_full_tokens(&user).await.unwrap();

        let stored = db.refresh_tokens().get(user.id).await.unwrap().unwrap();
        let now = Utc::now().naive_utc();
        db.refresh_tokens()
            .upsert(
                user.id,
                &stored.jti,
                &stored.token,
                now - TimeDelta::days(15),
                now - TimeDelta::days(1),
            )
            .await
            .unwrap();

        let result = provider
            .refresh_access_token(&Principal::from(&user))
            .await;
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn test_delete_refresh_token_is_idempotent() {
        let (provider, _, user) = setup().await;
        provider.create_full_tokens(&user).await.unwrap();

        provider.delete_refresh_token(user.id).await.unwrap();
        provider.delete_refresh_token(user.id).await.unwrap();

        let result = provider
            .refresh_access_token(&Principal::from(&user))
            .await;
        assert!(matches!(result, Err(TokenError::RefreshNotFound(_))));
    }

    #[tokio::test]
    async fn test_validate_rejects_garbage_and_refresh_tokens() {
        let (provider, db, user) = setup().await;

        assert!(matches!(
            provider.validate_token("garbage"),
            Err(TokenError::Invalid)
        ));

        provider.create_full_tokens(&user).await.unwrap();
        let stored = db.refresh_tokens().get(user.id).await.unwrap().unwrap();
        assert!(matches!(
            provider.validate_token(&stored.token),
            Err(TokenError::Invalid)
        ));
    }
}

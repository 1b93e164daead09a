//! Refresh token storage, one row per user.
//!
//! Access tokens are stateless and never stored.

use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePool;

use super::to_db_timestamp;

/// A stored refresh token.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: i64,
    pub jti: String,
    pub token: String,
    pub issued_at: String,
    pub expires_at: String,
}

pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store the refresh token for a user, replacing any previous one.
    pub async fn upsert(
        &self,
        user_id: i64,
        jti: &str,
        token: &str,
        issued_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, jti, token, issued_at, expires_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                jti = excluded.jti,
                token = excluded.token,
                issued_at = excluded.issued_at,
                expires_at = excluded.expires_at",
        )
        .bind(user_id)
        .bind(jti)
        .bind(token)
        .bind(to_db_timestamp(issued_at))
        .bind(to_db_timestamp(expires_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, user_id: i64) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT user_id, jti, token, issued_at, expires_at FROM refresh_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete the user's refresh token. Returns whether one existed.
    pub async fn delete(&self, user_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

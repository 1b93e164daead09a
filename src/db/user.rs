use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePool;

use super::to_db_timestamp;

#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
}

/// User role for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    User,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "USER",
            UserRole::Admin => "ADMIN",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "ADMIN" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    created_at: String,
    deleted_at: Option<String>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role: UserRole::from_str(&row.role),
            created_at: row.created_at,
            deleted_at: row.deleted_at,
        }
    }
}

impl UserStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user. Returns the user ID.
    pub async fn create(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        role: UserRole,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO users (email, password_hash, name, role) VALUES (?, ?, ?, ?)")
                .bind(email)
                .bind(password_hash)
                .bind(name)
                .bind(role.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    /// Get a live (not soft-deleted) user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name, role, created_at, deleted_at FROM users WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Get a live user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name, role, created_at, deleted_at FROM users WHERE email = ? AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    /// Check whether a live user already holds this email.
    pub async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = ? AND deleted_at IS NULL")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0 > 0)
    }

    /// List live users by ID.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name, role, created_at, deleted_at FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Count live users.
    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn update_name(&self, id: i64, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET name = ?, updated_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(name)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_role(&self, id: i64, role: UserRole) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET role = ?, updated_at = datetime('now') WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(role.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a user and their posts as deleted at `at` and drop their refresh token.
    /// Returns false if the user does not exist or is already deleted.
    pub async fn soft_delete(&self, id: i64, at: NaiveDateTime) -> Result<bool, sqlx::Error> {
        let at = to_db_timestamp(at);
        let mut tx = self.pool.begin().await?;

        let result =
            sqlx::query("UPDATE users SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(&at)
                .bind(id)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE posts SET deleted_at = ? WHERE user_id = ? AND deleted_at IS NULL")
            .bind(&at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Soft-deleted users whose deletion is at or before `cutoff`.
    pub async fn find_deleted_before(
        &self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<User>, sqlx::Error> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name, role, created_at, deleted_at FROM users WHERE deleted_at IS NOT NULL AND deleted_at <= ? ORDER BY id",
        )
        .bind(to_db_timestamp(cutoff))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Permanently remove soft-deleted users whose deletion is at or before `cutoff`.
    /// Posts and refresh tokens go with them through the foreign keys.
    pub async fn purge_deleted_before(&self, cutoff: NaiveDateTime) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM users WHERE deleted_at IS NOT NULL AND deleted_at <= ?")
                .bind(to_db_timestamp(cutoff))
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

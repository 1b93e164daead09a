//! Post storage.
//!
//! Every read joins the writer and skips soft-deleted posts and posts whose
//! writer has been soft-deleted.

use chrono::NaiveDateTime;
use sqlx::sqlite::SqlitePool;

use super::{UserRole, to_db_timestamp};

#[derive(Clone)]
pub struct PostStore {
    pool: SqlitePool,
}

/// The author of a post.
#[derive(Debug, Clone)]
pub struct Writer {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub sub_title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub writer: Writer,
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    title: String,
    sub_title: String,
    content: String,
    created_at: String,
    updated_at: String,
    writer_id: i64,
    writer_email: String,
    writer_name: String,
    writer_role: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            sub_title: row.sub_title,
            content: row.content,
            created_at: row.created_at,
            updated_at: row.updated_at,
            writer: Writer {
                id: row.writer_id,
                email: row.writer_email,
                name: row.writer_name,
                role: UserRole::from_str(&row.writer_role),
            },
        }
    }
}

/// JSON array text for binding an ID list to `json_each(?)`.
fn id_list(ids: &[i64]) -> String {
    serde_json::Value::from(ids.to_vec()).to_string()
}

impl PostStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new post. Returns the post ID.
    pub async fn create(
        &self,
        user_id: i64,
        title: &str,
        sub_title: &str,
        content: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        // The writer check and the insert are one statement so a concurrent
        // user delete cannot leave an orphaned post behind.
        let result = sqlx::query(
            "INSERT INTO posts (user_id, title, sub_title, content)
             SELECT ?, ?, ?, ?
             WHERE EXISTS (SELECT 1 FROM users WHERE id = ? AND deleted_at IS NULL)",
        )
        .bind(user_id)
        .bind(title)
        .bind(sub_title)
        .bind(content)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>, sqlx::Error> {
        let row: Option<PostRow> = sqlx::query_as(
            "SELECT p.id, p.title, p.sub_title, p.content, p.created_at, p.updated_at,
                u.id AS writer_id, u.email AS writer_email, u.name AS writer_name, u.role AS writer_role
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.id = ? AND p.deleted_at IS NULL AND u.deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Post::from))
    }

    /// List posts, newest first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Post>, sqlx::Error> {
        self.list_excluding(&[], limit, offset).await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        self.count_excluding(&[]).await
    }

    /// List posts whose writer is not one of `user_ids`, newest first.
    pub async fn list_excluding(
        &self,
        user_ids: &[i64],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, sqlx::Error> {
        let rows: Vec<PostRow> = sqlx::query_as(
            "SELECT p.id, p.title, p.sub_title, p.content, p.created_at, p.updated_at,
                u.id AS writer_id, u.email AS writer_email, u.name AS writer_name, u.role AS writer_role
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.deleted_at IS NULL AND u.deleted_at IS NULL
               AND p.user_id NOT IN (SELECT value FROM json_each(?))
             ORDER BY p.id DESC
             LIMIT ? OFFSET ?",
        )
        .bind(id_list(user_ids))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Post::from).collect())
    }

    pub async fn count_excluding(&self, user_ids: &[i64]) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.deleted_at IS NULL AND u.deleted_at IS NULL
               AND p.user_id NOT IN (SELECT value FROM json_each(?))",
        )
        .bind(id_list(user_ids))
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }

    /// Update the given fields, leaving `None` fields unchanged.
    pub async fn update(
        &self,
        id: i64,
        title: Option<&str>,
        sub_title: Option<&str>,
        content: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE posts SET
                title = COALESCE(?, title),
                sub_title = COALESCE(?, sub_title),
                content = COALESCE(?, content),
                updated_at = datetime('now')
            WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(title)
        .bind(sub_title)
        .bind(content)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn soft_delete(&self, id: i64, at: NaiveDateTime) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE posts SET deleted_at = ? WHERE id = ? AND deleted_at IS NULL")
                .bind(to_db_timestamp(at))
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, UserRole};

    async fn setup() -> (Database, i64, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let alice = db
            .users()
            .create("alice@example.com", "hash", "Alice", UserRole::User)
            .await
            .unwrap();
        let bob = db
            .users()
            .create("bob@example.com", "hash", "Bob", UserRole::Admin)
            .await
            .unwrap();
        (db, alice, bob)
    }

    #[tokio::test]
    async fn test_create_and_get_with_writer() {
        let (db, alice, _) = setup().await;

        let id = db
            .posts()
            .create(alice, "Title", "Sub", "Body")
            .await
            .unwrap()
            .unwrap();
        let post = db.posts().get_by_id(id).await.unwrap().unwrap();

        assert_eq!(post.title, "Title");
        assert_eq!(post.sub_title, "Sub");
        assert_eq!(post.writer.id, alice);
        assert_eq!(post.writer.name, "Alice");
        assert_eq!(post.writer.role, UserRole::User);
    }

    #[tokio::test]
    async fn test_list_excluding_writers() {
        let (db, alice, bob) = setup().await;
        db.posts().create(alice, "a1", "", "").await.unwrap().unwrap();
        db.posts().create(bob, "b1", "", "").await.unwrap().unwrap();
        db.posts().create(alice, "a2", "", "").await.unwrap().unwrap();

        let all = db.posts().list(10, 0).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].title, "a2");
        assert_eq!(db.posts().count().await.unwrap(), 3);

        let without_alice = db.posts().list_excluding(&[alice], 10, 0).await.unwrap();
        assert_eq!(without_alice.len(), 1);
        assert_eq!(without_alice[0].title, "b1");
        assert_eq!(db.posts().count_excluding(&[alice]).await.unwrap(), 1);
        assert_eq!(db.posts().count_excluding(&[alice, bob]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_update_and_soft_delete() {
        let (db, alice, _) = setup().await;
        let id = db
            .posts()
            .create(alice, "Title", "Sub", "Body")
            .await
            .unwrap()
            .unwrap();

        assert!(
            db.posts()
                .update(id, None, None, Some("New body"))
                .await
                .unwrap()
        );
        let post = db.posts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(post.title, "Title");
        assert_eq!(post.content, "New body");

        let now = chrono::Utc::now().naive_utc();
        assert!(db.posts().soft_delete(id, now).await.unwrap());
        assert!(db.posts().get_by_id(id).await.unwrap().is_none());
        assert!(!db.posts().update(id, Some("x"), None, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_refused_for_deleted_writer() {
        let (db, alice, _) = setup().await;
        let now = chrono::Utc::now().naive_utc();
        assert!(db.users().soft_delete(alice, now).await.unwrap());

        let created = db.posts().create(alice, "Late", "", "").await.unwrap();
        assert!(created.is_none());
        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);

        // Unknown writer
        assert!(db.posts().create(9999, "t", "", "").await.unwrap().is_none());
    }
}

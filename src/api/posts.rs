//! Posts API.
//!
//! All endpoints require authentication. Editing and deleting is limited to
//! the writer and admins.

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::response::{Page, PageQuery, created, ok};
use super::users::UserResponse;
use super::validation::Validator;
use crate::auth::{Auth, Principal};
use crate::db::{Database, Post};

const TITLE_MAX: usize = 200;
const SUB_TITLE_MAX: usize = 200;

#[derive(Clone)]
pub struct PostsState {
    pub db: Database,
}

pub fn router(state: PostsState) -> Router {
    Router::new()
        .route("/", get(list_posts))
        .route("/", put(create_post))
        .route("/exclude-users", get(list_posts_excluding))
        .route(
            "/{post_id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
        .with_state(state)
}

// --- Request/Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostRequest {
    title: String,
    #[serde(default)]
    sub_title: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdatePostRequest {
    title: Option<String>,
    sub_title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExcludeUsersQuery {
    /// Comma-separated user IDs
    #[serde(default)]
    user_ids: String,
    page: Option<i64>,
    size: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostResponse {
    post_id: i64,
    title: String,
    sub_title: String,
    content: String,
    created_at: String,
    updated_at: String,
    writer: UserResponse,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            post_id: post.id,
            title: post.title,
            sub_title: post.sub_title,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.updated_at,
            writer: UserResponse {
                user_id: post.writer.id,
                email: post.writer.email,
                name: post.writer.name,
                role: post.writer.role,
            },
        }
    }
}

// --- Helpers ---

async fn load_post(db: &Database, post_id: i64) -> Result<Post, ApiError> {
    db.posts()
        .get_by_id(post_id)
        .await
        .db_err("Failed to get post")?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

fn ensure_can_modify(principal: &Principal, post: &Post) -> Result<(), ApiError> {
    if post.writer.id == principal.user_id || principal.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only the writer can modify this post"))
    }
}

fn parse_user_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| ApiError::bad_request(format!("Invalid user id: {}", s)))
        })
        .collect()
}

// --- Handlers ---

async fn create_post(
    State(state): State<PostsState>,
    auth: Auth,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    Validator::new()
        .not_blank("title", &payload.title)
        .length("title", &payload.title, 1, TITLE_MAX)
        .length("subTitle", &payload.sub_title, 0, SUB_TITLE_MAX)
        .finish()?;

    let id = state
        .db
        .posts()
        .create(
            auth.user_id,
            &payload.title,
            &payload.sub_title,
            &payload.content,
        )
        .await
        .db_err("Failed to create post")?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;
    info!(post_id = id, user_id = auth.user_id, "Post created");

    let post = load_post(&state.db, id).await?;
    Ok(created(PostResponse::from(post)))
}

async fn get_post(
    State(state): State<PostsState>,
    _auth: Auth,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = load_post(&state.db, post_id).await?;
    Ok(ok(PostResponse::from(post)))
}

async fn list_posts(
    State(state): State<PostsState>,
    _auth: Auth,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let posts = state.db.posts();
    let content = posts
        .list(query.size(), query.offset())
        .await
        .db_err("Failed to list posts")?;
    let total = posts.count().await.db_err("Failed to count posts")?;

    let content = content.into_iter().map(PostResponse::from).collect();
    Ok(ok(Page::new(content, &query, total)))
}

async fn list_posts_excluding(
    State(state): State<PostsState>,
    _auth: Auth,
    Query(query): Query<ExcludeUsersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_ids = parse_user_ids(&query.user_ids)?;
    let page = PageQuery {
        page: query.page,
        size: query.size,
    };

    let posts = state.db.posts();
    let content = posts
        .list_excluding(&user_ids, page.size(), page.offset())
        .await
        .db_err("Failed to list posts")?;
    let total = posts
        .count_excluding(&user_ids)
        .await
        .db_err("Failed to count posts")?;

    let content = content.into_iter().map(PostResponse::from).collect();
    Ok(ok(Page::new(content, &page, total)))
}

async fn update_post(
    State(state): State<PostsState>,
    auth: Auth,
    Path(post_id): Path<i64>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    let mut validator = Validator::new();
    if let Some(title) = &payload.title {
        validator
            .not_blank("title", title)
            .length("title", title, 1, TITLE_MAX);
    }
    if let Some(sub_title) = &payload.sub_title {
        validator.length("subTitle", sub_title, 0, SUB_TITLE_MAX);
    }
    validator.finish()?;

    let post = load_post(&state.db, post_id).await?;
    ensure_can_modify(&auth, &post)?;

    state
        .db
        .posts()
        .update(
            post_id,
            payload.title.as_deref(),
            payload.sub_title.as_deref(),
            payload.content.as_deref(),
        )
        .await
        .db_err("Failed to update post")?;

    let post = load_post(&state.db, post_id).await?;
    Ok(ok(PostResponse::from(post)))
}

async fn delete_post(
    State(state): State<PostsState>,
    auth: Auth,
    Path(post_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let post = load_post(&state.db, post_id).await?;
    ensure_can_modify(&auth, &post)?;

    state
        .db
        .posts()
        .soft_delete(post_id, Utc::now().naive_utc())
        .await
        .db_err("Failed to delete post")?;
    info!(post_id, user_id = auth.user_id, "Post deleted");

    Ok(StatusCode::NO_CONTENT)
}

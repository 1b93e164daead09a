//! User API.
//!
//! - POST `/register` - Create an account and sign in (public, rate limited)
//! - GET `/` - Page through users
//! - GET `/{user_id}` - Get a user
//! - PATCH `/` - Update the caller's profile
//! - PATCH `/{user_id}` - Update a user (self or admin; role changes admin only)
//! - DELETE `/{user_id}` - Soft-delete a user (self or admin)

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::SignInResponse;
use super::error::{ApiError, ResultExt};
use super::response::{Page, PageQuery, created, ok};
use super::validation::Validator;
use crate::auth::{Auth, TokenProvider, hash_password};
use crate::db::{Database, User, UserRole};
use crate::rate_limit::{RateLimitConfig, rate_limit_register};

const PASSWORD_MIN: usize = 8;
const PASSWORD_MAX: usize = 20;
const NAME_MAX: usize = 50;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub tokens: TokenProvider,
}

pub fn router(state: UsersState, rate_limit: Arc<RateLimitConfig>) -> Router {
    let register_router = Router::new()
        .route("/register", post(register))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(rate_limit, rate_limit_register));

    Router::new()
        .route("/", get(list_users).patch(update_me))
        .route(
            "/{user_id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .with_state(state)
        .merge(register_router)
}

// --- Request/Response types ---

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    name: String,
}

#[derive(Deserialize)]
struct UpdateMeRequest {
    name: Option<String>,
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    name: Option<String>,
    role: Option<UserRole>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        }
    }
}

// --- Helpers ---

async fn load_user(db: &Database, user_id: i64) -> Result<User, ApiError> {
    db.users()
        .get_by_id(user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    Validator::new()
        .not_blank("name", name)
        .length("name", name, 1, NAME_MAX)
        .finish()
}

// --- Handlers ---

async fn register(
    State(state): State<UsersState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    Validator::new()
        .email("email", &payload.email)
        .secret_length("password", &payload.password, PASSWORD_MIN, PASSWORD_MAX)
        .not_blank("name", &payload.name)
        .length("name", &payload.name, 1, NAME_MAX)
        .finish()?;

    let users = state.db.users();
    if users
        .email_exists(&payload.email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::conflict("Email already exists"));
    }

    let password_hash = hash_password(&payload.password)?;
    let id = users
        .create(
            &payload.email,
            &password_hash,
            payload.name.trim(),
            UserRole::User,
        )
        .await
        .map_err(|e| match e {
            // Lost a race with a concurrent registration
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ApiError::conflict("Email already exists")
            }
            e => ApiError::db_error("Failed to create user", e),
        })?;

    let user = load_user(&state.db, id).await?;
    let access_token = state.tokens.create_full_tokens(&user).await?;
    info!(user_id = id, "User registered");

    Ok(created(SignInResponse::new(user, access_token)))
}

async fn get_user(
    State(state): State<UsersState>,
    _auth: Auth,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = load_user(&state.db, user_id).await?;
    Ok(ok(UserResponse::from(user)))
}

async fn list_users(
    State(state): State<UsersState>,
    _auth: Auth,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users();
    let content = users
        .list(query.size(), query.offset())
        .await
        .db_err("Failed to list users")?;
    let total = users.count().await.db_err("Failed to count users")?;

    let content = content.into_iter().map(UserResponse::from).collect();
    Ok(ok(Page::new(content, &query, total)))
}

async fn update_me(
    State(state): State<UsersState>,
    auth: Auth,
    payload: Result<Json<UpdateMeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if let Some(name) = &payload.name {
        validate_name(name)?;
        state
            .db
            .users()
            .update_name(auth.user_id, name.trim())
            .await
            .db_err("Failed to update user")?;
    }

    let user = load_user(&state.db, auth.user_id).await?;
    Ok(ok(UserResponse::from(user)))
}

async fn update_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(user_id): Path<i64>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    if auth.user_id != user_id && !auth.is_admin() {
        return Err(ApiError::forbidden("Cannot modify another user"));
    }
    if payload.role.is_some() && !auth.is_admin() {
        return Err(ApiError::forbidden("Only admins can change roles"));
    }
    if let Some(name) = &payload.name {
        validate_name(name)?;
    }

    // 404 before any write
    load_user(&state.db, user_id).await?;

    let users = state.db.users();
    if let Some(name) = &payload.name {
        users
            .update_name(user_id, name.trim())
            .await
            .db_err("Failed to update user")?;
    }
    if let Some(role) = payload.role {
        users
            .set_role(user_id, role)
            .await
            .db_err("Failed to update role")?;
        info!(user_id, role = role.as_str(), by = auth.user_id, "Role changed");
    }

    let user = load_user(&state.db, user_id).await?;
    Ok(ok(UserResponse::from(user)))
}

async fn delete_user(
    State(state): State<UsersState>,
    auth: Auth,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if auth.user_id != user_id && !auth.is_admin() {
        return Err(ApiError::forbidden("Cannot delete another user"));
    }

    let deleted = state
        .db
        .users()
        .soft_delete(user_id, Utc::now().naive_utc())
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    // The refresh token went with the user in the same transaction
    info!(user_id, by = auth.user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

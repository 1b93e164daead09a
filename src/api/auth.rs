//! Sign-in, sign-out and access token refresh.
//!
//! - POST `/signIn` - Exchange email and password for an access token
//! - POST `/signOut` - Delete the caller's refresh token
//! - POST `/refresh` - Mint a new access token from the stored refresh token

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    middleware,
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::{ApiError, ResultExt};
use super::response::{created, ok};
use super::validation::Validator;
use crate::auth::{Auth, TokenProvider, verify_password};
use crate::db::{Database, User, UserRole};
use crate::rate_limit::{RateLimitConfig, rate_limit_sign_in};

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub tokens: TokenProvider,
}

pub fn router(state: AuthState, rate_limit: Arc<RateLimitConfig>) -> Router {
    let sign_in_router = Router::new()
        .route("/signIn", post(sign_in))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(rate_limit, rate_limit_sign_in));

    Router::new()
        .route("/signOut", post(sign_out))
        .route("/refresh", post(refresh))
        .with_state(state)
        .merge(sign_in_router)
}

#[derive(Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

/// Returned by sign-in and registration.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub access_token: String,
}

impl SignInResponse {
    pub fn new(user: User, access_token: String) -> Self {
        Self {
            user_id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            access_token,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

async fn sign_in(
    State(state): State<AuthState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;

    Validator::new()
        .email("email", &payload.email)
        .not_blank("password", &payload.password)
        .finish()?;

    let user = state
        .db
        .users()
        .get_by_email(&payload.email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&payload.password, &user.password_hash) {
        return Err(ApiError::unauthorized("Invalid password"));
    }

    let access_token = state.tokens.create_full_tokens(&user).await?;
    info!(user_id = user.id, "User signed in");

    Ok(ok(SignInResponse::new(user, access_token)))
}

async fn sign_out(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    state.tokens.delete_refresh_token(auth.user_id).await?;
    info!(user_id = auth.user_id, "User signed out");
    Ok(ok(()))
}

async fn refresh(
    State(state): State<AuthState>,
    auth: Auth,
) -> Result<impl IntoResponse, ApiError> {
    let access_token = state.tokens.refresh_access_token(&auth).await?;
    Ok(created(RefreshResponse { access_token }))
}

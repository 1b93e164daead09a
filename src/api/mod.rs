mod auth;
mod error;
mod posts;
pub mod response;
mod users;
mod validation;

use axum::Router;
use std::sync::Arc;

use crate::auth::TokenProvider;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

pub use error::{ApiError, ResultExt};
pub use response::ErrorResponse;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: TokenProvider,
    rate_limit: Arc<RateLimitConfig>,
) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        tokens: tokens.clone(),
    };

    let users_state = users::UsersState {
        db: db.clone(),
        tokens,
    };

    let posts_state = posts::PostsState { db };

    Router::new()
        .nest("/auth", auth::router(auth_state, rate_limit.clone()))
        .nest("/users", users::router(users_state, rate_limit))
        .nest("/posts", posts::router(posts_state))
}

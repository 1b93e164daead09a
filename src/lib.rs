pub mod api;
pub mod auth;
pub mod batch;
pub mod cli;
pub mod db;
pub mod jwt;
pub mod logging;
pub mod rate_limit;
pub mod scheduler;

use api::create_api_router;
use auth::{TokenProvider, jwt_auth_filter};
use axum::{Router, middleware};
use batch::{DeleteUserJob, JobLauncher, JobRegistry};
use chrono::NaiveTime;
use db::Database;
use jwt::JwtConfig;
use rate_limit::RateLimitConfig;
use scheduler::UserScheduler;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Path prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    /// Months a soft-deleted user is kept before the purge removes it
    pub retention_months: u32,
    /// Local time of day the purge runs
    pub purge_at: NaiveTime,
    pub sign_in_per_minute: u32,
    pub register_per_minute: u32,
    /// Client IP header (requires running behind a proxy)
    pub ip_header: Option<cli::ClientIpHeader>,
}

impl ServerConfig {
    pub fn token_provider(&self) -> TokenProvider {
        let jwt = JwtConfig::with_ttl(
            &self.jwt_secret,
            self.access_token_ttl_secs,
            self.refresh_token_ttl_secs,
        );
        TokenProvider::new(Arc::new(jwt), self.db.clone())
    }
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = config.token_provider();
    let rate_limit = Arc::new(RateLimitConfig::new(
        config.sign_in_per_minute,
        config.register_per_minute,
        config.ip_header,
    ));

    let api_router = create_api_router(config.db.clone(), tokens.clone(), rate_limit)
        .layer(middleware::from_fn_with_state(tokens, jwt_auth_filter));

    Router::new()
        .nest(API_PREFIX, api_router)
        .layer(middleware::from_fn(logging::log_requests))
}

/// Build the nightly purge scheduler with `deleteUserJob` registered.
pub fn build_scheduler(config: &ServerConfig) -> UserScheduler {
    let mut registry = JobRegistry::new();
    registry.register(Arc::new(DeleteUserJob::new(
        config.db.clone(),
        config.retention_months,
    )));

    UserScheduler::new(
        Arc::new(registry),
        JobLauncher::new(config.db.clone()),
        config.purge_at,
    )
}

/// Spawn the purge scheduler in the background.
/// Call this before starting the server.
pub fn init_scheduler(config: &ServerConfig) -> tokio::task::JoinHandle<()> {
    build_scheduler(config).spawn()
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_scheduler` before this to enable the nightly purge.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

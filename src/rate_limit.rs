//! Rate limiting for sign-in and registration.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};

use crate::api::ApiError;
use crate::auth::extract_client_ip;
use crate::cli::ClientIpHeader;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Key for requests whose client IP cannot be determined. They share one bucket.
const UNKNOWN_CLIENT: &str = "unknown";

pub const DEFAULT_SIGN_IN_PER_MINUTE: u32 = 10;
pub const DEFAULT_REGISTER_PER_MINUTE: u32 = 5;

#[derive(Clone)]
pub struct RateLimitConfig {
    pub sign_in: Arc<IpLimiter>,
    pub register: Arc<IpLimiter>,
    /// Header carrying the client IP when running behind a proxy
    pub ip_header: Option<ClientIpHeader>,
}

impl RateLimitConfig {
    /// Create limiters allowing the given number of requests per minute per IP.
    /// Zero is treated as one.
    pub fn new(
        sign_in_per_minute: u32,
        register_per_minute: u32,
        ip_header: Option<ClientIpHeader>,
    ) -> Self {
        Self {
            sign_in: Arc::new(RateLimiter::keyed(per_minute(sign_in_per_minute))),
            register: Arc::new(RateLimiter::keyed(per_minute(register_per_minute))),
            ip_header,
        }
    }

    fn client_key(&self, request: &Request) -> String {
        extract_client_ip(request, self.ip_header).unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SIGN_IN_PER_MINUTE, DEFAULT_REGISTER_PER_MINUTE, None)
    }
}

fn per_minute(n: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN))
}

/// Middleware for rate limiting sign-in.
pub async fn rate_limit_sign_in(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = config.client_key(&request);
    match config.sign_in.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => ApiError::too_many_requests(
            "Too many sign-in attempts. Please wait before trying again.",
        )
        .into_response(),
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let key = config.client_key(&request);
    match config.register.check_key(&key) {
        Ok(_) => next.run(request).await,
        Err(_) => ApiError::too_many_requests(
            "Too many signup attempts. Please wait before trying again.",
        )
        .into_response(),
    }
}

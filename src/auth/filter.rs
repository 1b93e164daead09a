//! Bearer token authentication middleware.
//!
//! Runs once per request. A request without a token passes through as
//! anonymous; a request with a bad token is answered with 401 immediately.
//! Handlers that need an identity use the `Auth` extractor.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::errors::TokenError;
use super::principal::Principal;
use super::provider::TokenProvider;
use super::responder::send_error_response;

const BEARER_PREFIX: &str = "Bearer ";

/// Marks a request the filter has already processed.
#[derive(Clone, Copy)]
struct Filtered;

/// Extract the bearer token from the `Authorization` header.
/// Other schemes and empty tokens count as no token.
pub fn resolve_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Decide the identity of a request from its headers.
///
/// `Ok(None)` is an anonymous request, `Err` a token that must be rejected.
pub fn authenticate(
    headers: &HeaderMap,
    provider: &TokenProvider,
) -> Result<Option<Principal>, TokenError> {
    let Some(token) = resolve_token(headers) else {
        return Ok(None);
    };
    provider.validate_token(token)?;
    provider.get_authentication(token).map(Some)
}

/// Middleware installing the request's `Principal`, or rejecting the request.
pub async fn jwt_auth_filter(
    State(provider): State<TokenProvider>,
    mut request: Request,
    next: Next,
) -> Response {
    if request.extensions().get::<Filtered>().is_some() {
        return next.run(request).await;
    }
    request.extensions_mut().insert(Filtered);

    // Only the filter may put a principal on the request
    request.extensions_mut().remove::<Principal>();

    match authenticate(request.headers(), &provider) {
        Ok(Some(principal)) => {
            debug!(user_id = principal.user_id, "Authenticated request");
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => send_error_response(&request, &e, &e.to_string()),
    }
}

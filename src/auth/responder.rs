//! Direct 401 responses for authentication failures.
//!
//! The filter answers before any handler runs, so the body is serialized
//! here rather than through `ApiError`.

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::api::ErrorResponse;

/// Build the 401 response for a failed authentication attempt.
///
/// Never fails: if the body cannot be serialized the client still gets a bare 401.
pub fn send_error_response(
    request: &Request,
    cause: &dyn std::error::Error,
    message: &str,
) -> Response {
    warn!(
        method = %request.method(),
        uri = %request.uri(),
        error = %cause,
        "Authentication failed"
    );

    let body = ErrorResponse::new(StatusCode::UNAUTHORIZED, message);
    match serde_json::to_vec(&body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            response
        }
        Err(e) => {
            error!(error = %e, "Failed to write authentication error body");
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}

//! Per-request access log.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{error, info, warn};

/// Log every request as `METHOD uri - status` once the response is ready.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();
    let duration_us = start.elapsed().as_micros() as u64;
    let line = format!("{} {} - {}", method, uri, status.as_u16());

    if status.is_server_error() {
        error!(duration_us, "{}", line);
    } else if status.is_client_error() {
        warn!(duration_us, "{}", line);
    } else {
        info!(duration_us, "{}", line);
    }

    response
}

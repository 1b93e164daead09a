//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

use crate::cli::ClientIpHeader;

/// Extract the client IP of a request.
///
/// With a configured header (running behind a proxy) the header is the only
/// source. Without one, the peer address from `ConnectInfo` is used.
pub fn extract_client_ip(request: &Request, ip_header: Option<ClientIpHeader>) -> Option<String> {
    match ip_header {
        Some(header) => {
            let value = request.headers().get(header.header_name())?.to_str().ok()?;
            header.parse(value)
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string()),
    }
}

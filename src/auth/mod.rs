//! JWT authentication.
//!
//! Short-lived, stateless access tokens travel as `Authorization: Bearer`.
//! One long-lived refresh token per user is stored in the database and can
//! mint new access tokens until it expires or is deleted.

mod errors;
mod extractors;
mod filter;
mod ip;
mod password;
mod principal;
mod provider;
mod responder;

pub use errors::TokenError;
pub use extractors::Auth;
pub use filter::{authenticate, jwt_auth_filter, resolve_token};
pub use ip::extract_client_ip;
pub use password::{PasswordError, hash_password, verify_password};
pub use principal::Principal;
pub use provider::TokenProvider;
pub use responder::send_error_response;

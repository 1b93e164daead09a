//! Axum extractor for the authenticated principal.

use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::principal::Principal;
use crate::api::ApiError;

/// Extractor for handlers that require an authenticated principal.
///
/// Reads the principal installed by `jwt_auth_filter`; none is a 401.
/// Role checks live in the handlers, which know the resource being touched.
pub struct Auth {
    pub principal: Principal,
}

impl Deref for Auth {
    type Target = Principal;

    fn deref(&self) -> &Principal {
        &self.principal
    }
}

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

        Ok(Self { principal })
    }
}

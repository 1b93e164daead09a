use crate::db::{User, UserRole};
use crate::jwt::AccessClaims;

use super::errors::TokenError;

/// The authenticated identity of a request.
///
/// Built from a validated access token and carried in the request's own
/// extensions, so it never outlives the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

impl TryFrom<AccessClaims> for Principal {
    type Error = TokenError;

    fn try_from(claims: AccessClaims) -> Result<Self, Self::Error> {
        let user_id = claims.sub.parse().map_err(|_| TokenError::Invalid)?;
        Ok(Self {
            user_id,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        })
    }
}

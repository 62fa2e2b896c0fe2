//! Request authentication
//!
//! Identity issuance (registration, login, token expiry) belongs to
//! the external auth service; this module only resolves a presented
//! bearer token against its published validity table and rejects
//! before any handler state is touched.

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sqlx::SqlitePool;

use proctor_common::models::role;

use crate::state::AppContext;
use crate::{Error, Result};

/// Authenticated caller: opaque user id plus role
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
}

impl Identity {
    pub fn is_professor(&self) -> bool {
        self.role == role::PROFESSOR
    }

    pub fn require_role(&self, required: &str) -> Result<()> {
        if self.role == required {
            Ok(())
        } else {
            Err(Error::Forbidden(format!("{required} role required")))
        }
    }
}

/// Resolve a bearer token to an identity
pub async fn authenticate(pool: &SqlitePool, token: &str) -> Result<Identity> {
    match crate::db::tokens::lookup(pool, token).await? {
        Some((user_id, role)) => Ok(Identity { user_id, role }),
        None => Err(Error::Unauthorized("invalid or expired token".to_string())),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    AppContext: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let ctx = AppContext::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| Error::Unauthorized("missing Authorization header".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| Error::Unauthorized("expected Bearer token".to_string()))?;
        authenticate(&ctx.db, token).await
    }
}

//! Caller identity extracted from request headers.
//!
//! The BFF authenticates the user and forwards their id and role in
//! `X-User-ID` and `X-User-Role`. This service trusts those headers and
//! must only be reachable through the BFF.

use crate::models::{Actor, Role};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// Authenticated caller of a ledger endpoint.
#[derive(Debug, Clone)]
pub struct ActorContext(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for ActorContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-User-ID header (required from BFF)"
                ))
            })?;

        let role = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Role::parse)
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing or invalid X-User-Role header (owner or tenant)"
                ))
            })?;

        let span = tracing::Span::current();
        span.record("user_id", user_id);
        span.record("role", role.as_str());

        Ok(ActorContext(Actor {
            id: user_id.to_string(),
            role,
        }))
    }
}

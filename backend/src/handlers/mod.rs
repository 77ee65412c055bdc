//! HTTP handlers
//!
//! Handlers are thin: extract, call the engine, wrap the result in JSON.

use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::AppError;

pub mod catalog;
pub mod dashboard;
pub mod health;
pub mod operations;
pub mod stock;

pub use catalog::*;
pub use dashboard::*;
pub use health::*;
pub use operations::*;
pub use stock::*;

/// Header carrying the id of the user performing the request
pub const USER_ID_HEADER: &str = "x-user-id";

/// The user a mutating request acts on behalf of
#[derive(Debug, Clone, Copy)]
pub struct ActingUser(pub Uuid);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::malformed(USER_ID_HEADER, "header is required"))?;
        value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(ActingUser)
            .ok_or_else(|| AppError::malformed(USER_ID_HEADER, "must be a UUID"))
    }
}

use anyhow::anyhow;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::{Identity, User};
use crate::error::AppError;

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // ---
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| AppError::ServerError(anyhow!("request identity was never bound")))
    }
}

/// The authenticated user behind the request.
///
/// For handlers mounted behind a gate; an anonymous caller is `AuthRequired`.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // ---
        match Identity::from_request_parts(parts, state).await? {
            Identity::User(user) => Ok(CurrentUser(user)),
            Identity::Anonymous => Err(AppError::AuthRequired),
        }
    }
}

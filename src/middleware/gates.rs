use anyhow::anyhow;
use axum::extract::Request;
use axum::http::HeaderMap;

use super::{Flow, Stage};
use crate::domain::Identity;
use crate::error::AppError;

/// Rejects anonymous callers. Must run after [`super::Authenticate`].
pub struct RequireAuthenticated;

/// Rejects anonymous callers and users who have not activated their account.
pub struct RequireActivated;

#[async_trait::async_trait]
impl Stage for RequireAuthenticated {
    // ---
    async fn process(&self, req: &mut Request, _headers: &mut HeaderMap) -> Flow {
        // ---
        match req.extensions().get::<Identity>() {
            None => AppError::ServerError(anyhow!("gate ran before the authenticator")).into(),
            Some(Identity::Anonymous) => AppError::AuthRequired.into(),
            Some(Identity::User(_)) => Flow::Continue,
        }
    }
}

#[async_trait::async_trait]
impl Stage for RequireActivated {
    // ---
    async fn process(&self, req: &mut Request, headers: &mut HeaderMap) -> Flow {
        // ---
        if let Flow::Respond(response) = RequireAuthenticated.process(req, headers).await {
            return Flow::Respond(response);
        }

        match req.extensions().get::<Identity>().and_then(Identity::user) {
            Some(user) if user.activated => Flow::Continue,
            _ => AppError::InactiveAccount.into(),
        }
    }
}

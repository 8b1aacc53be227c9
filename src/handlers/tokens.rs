use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::domain::{
    validate_email, validate_password_plaintext, MailTemplate, Scope, Validator,
};
use crate::error::AppError;
use crate::handlers::shared_types::{JsonBody, MessageResponse};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PasswordResetRequestInput {
    #[serde(default)]
    email: String,
}

/// Exchange email and password for a bearer token (POST /api/v1/tokens/authentication).
///
/// An unknown email and a wrong password produce the same 401.
#[tracing::instrument(skip(state, input))]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CredentialsInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // ---
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    v.into_result()?;

    let user = state
        .users()
        .get_user_by_email(&input.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !user.password.matches(&input.password).await? {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.issue_token(user.id, Scope::Authentication).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "authenticationToken": token })),
    ))
}

/// Mail a password-reset token to a registered address (POST /api/v1/tokens/password-reset).
#[tracing::instrument(skip(state, input))]
pub async fn create_password_reset_token(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<PasswordResetRequestInput>,
) -> Result<Json<MessageResponse>, AppError> {
    // ---
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    v.into_result()?;

    let user = state
        .users()
        .get_user_by_email(&input.email)
        .await?
        .ok_or(AppError::NotFound)?;

    let token = state.issue_token(user.id, Scope::PasswordReset).await?;

    let mailer = state.mailer().clone();
    let data = json!({ "passwordResetToken": token.plaintext });
    state.background().spawn("password_reset_email", async move {
        mailer.send(&user.email, MailTemplate::PasswordReset, data).await
    });

    Ok(Json(MessageResponse {
        message: "an email will be sent to you containing password reset instructions",
    }))
}

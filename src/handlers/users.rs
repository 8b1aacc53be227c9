use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app_state::AppState;
use crate::domain::{
    validate_email, validate_password_plaintext, validate_token_plaintext, validate_username,
    MailTemplate, NewUser, Password, Scope, Validator,
};
use crate::error::AppError;
use crate::handlers::shared_types::{JsonBody, MessageResponse};
use crate::middleware::CurrentUser;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterInput {
    #[serde(default)]
    username: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateInput {
    #[serde(default)]
    token: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetPasswordInput {
    #[serde(default)]
    password: String,
    #[serde(default)]
    token: String,
}

/// Register a new, not yet activated user (POST /api/v1/users).
///
/// The activation token is mailed by a background task; the response does
/// not wait for delivery.
#[tracing::instrument(skip(state, input))]
pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // ---
    let mut v = Validator::new();
    validate_username(&mut v, &input.username);
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    v.into_result()?;

    let password = Password::set(&input.password).await?;
    let user = state
        .users()
        .insert_user(NewUser {
            username: input.username,
            email: input.email,
            password,
            activated: false,
        })
        .await?;

    let token = state.issue_token(user.id, Scope::Activation).await?;

    let mailer = state.mailer().clone();
    let recipient = user.email.clone();
    let data = json!({ "activationToken": token.plaintext, "userID": user.id });
    state.background().spawn("welcome_email", async move {
        mailer.send(&recipient, MailTemplate::UserWelcome, data).await
    });

    tracing::info!("Registered user {}", user.id);
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))))
}

/// Activate the account owning an activation token (PUT /api/v1/users/activated).
#[tracing::instrument(skip(state, input))]
pub async fn activate_user(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ActivateInput>,
) -> Result<Json<Value>, AppError> {
    // ---
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    v.into_result()?;

    let mut user = state
        .users()
        .get_user_for_token(Scope::Activation, &input.token)
        .await?
        .ok_or_else(|| AppError::field("token", "invalid or expired activation token"))?;

    user.activated = true;
    state.users().update_user(&mut user).await?;
    state
        .tokens()
        .delete_tokens_for_user(Scope::Activation, user.id)
        .await?;

    Ok(Json(json!({ "user": user })))
}

/// Set a new password using a password-reset token (PUT /api/v1/users/password).
#[tracing::instrument(skip(state, input))]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ResetPasswordInput>,
) -> Result<Json<MessageResponse>, AppError> {
    // ---
    let mut v = Validator::new();
    validate_password_plaintext(&mut v, &input.password);
    validate_token_plaintext(&mut v, &input.token);
    v.into_result()?;

    let mut user = state
        .users()
        .get_user_for_token(Scope::PasswordReset, &input.token)
        .await?
        .ok_or_else(|| AppError::field("token", "invalid or expired password reset token"))?;

    user.password = Password::set(&input.password).await?;
    state.users().update_user(&mut user).await?;
    state
        .tokens()
        .delete_tokens_for_user(Scope::PasswordReset, user.id)
        .await?;

    Ok(Json(MessageResponse {
        message: "your password was successfully reset",
    }))
}

/// Show the caller's own account (GET /api/v1/users/me).
pub async fn show_current_user(CurrentUser(user): CurrentUser) -> Json<Value> {
    // ---
    Json(json!({ "user": user }))
}

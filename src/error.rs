//! HTTP-facing error type.
//!
//! Every rejection the API produces, from a malformed body to a panic caught at
//! the outermost boundary, is an [`AppError`]. Each variant maps to exactly one
//! status code and a `{"error": ...}` JSON body.

use crate::domain::{DataError, FieldErrors};
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("failed validation")]
    FailedValidation(FieldErrors),

    #[error("the requested resource could not be found")]
    NotFound,

    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid authentication credentials")]
    InvalidCredentials,

    #[error("invalid or missing authentication token")]
    InvalidAuthToken,

    #[error("you must be authenticated to access this resource")]
    AuthRequired,

    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    #[error("the server encountered a problem and could not process your request")]
    ServerError(#[source] anyhow::Error),
}

impl AppError {
    // ---
    pub fn status(&self) -> StatusCode {
        // ---
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::EditConflict => StatusCode::CONFLICT,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidCredentials
            | AppError::InvalidAuthToken
            | AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount => StatusCode::FORBIDDEN,
            AppError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convenience for a single-field validation failure.
    pub fn field(key: &str, message: &str) -> Self {
        // ---
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        AppError::FailedValidation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();

        let body = match &self {
            AppError::FailedValidation(errors) => json!({ "error": errors }),
            AppError::ServerError(err) => {
                tracing::error!("{:#}", err);
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, AppError::InvalidAuthToken) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        // ---
        AppError::FailedValidation(errors)
    }
}

impl From<DataError> for AppError {
    fn from(err: DataError) -> Self {
        // ---
        match err {
            DataError::RecordNotFound => AppError::NotFound,
            DataError::EditConflict => AppError::EditConflict,
            DataError::DuplicateEmail => {
                AppError::field("email", "a user with this email address already exists")
            }
            DataError::Timeout(_) | DataError::Backend(_) => AppError::ServerError(err.into()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // ---
        AppError::ServerError(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        // ---
        AppError::BadRequest(rejection.body_text())
    }
}

use axum::extract::FromRequest;
use serde::Serialize;

use crate::error::AppError;

/// JSON request body whose rejections use the API's error envelope.
///
/// Malformed JSON, wrong field types and unknown fields all surface as a
/// 400 `{"error": "..."}` instead of axum's plain-text rejection.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Body for responses that only carry a human-readable message.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

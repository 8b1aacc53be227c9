use std::panic::AssertUnwindSafe;

use anyhow::anyhow;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tracing::Instrument;

use crate::background::panic_message;
use crate::error::AppError;

/// Outermost boundary: turns a panic anywhere downstream into a 500.
///
/// The connection is closed after the response since whatever state the
/// panicking handler left behind cannot be trusted. Everything logged while
/// handling the request is recorded inside a `request` span.
pub async fn panic_guard(req: Request, next: Next) -> Response {
    // ---
    let span = tracing::info_span!("request", method = %req.method(), uri = %req.uri());

    async move {
        match AssertUnwindSafe(next.run(req)).catch_unwind().await {
            Ok(response) => response,
            Err(payload) => {
                let cause = anyhow!("handler panicked: {}", panic_message(payload.as_ref()));

                let mut response = AppError::ServerError(cause).into_response();
                response
                    .headers_mut()
                    .insert(header::CONNECTION, HeaderValue::from_static("close"));
                response
            }
        }
    }
    .instrument(span)
    .await
}

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    environment: String,
    version: &'static str,
}

/// Responds with the availability of the server.
///
/// # Responses
/// - `200 OK` with `{"status": "available", "environment": ..., "version": ...}`
///
/// # Examples
/// - `GET /health` → 200 OK
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    // ---
    Json(HealthResponse {
        status: "available",
        environment: state.config().server.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

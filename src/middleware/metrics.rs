use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::MetricsPtr;

/// Record latency and outcome of every request, labelled by route template.
pub async fn track_metrics(
    State(metrics): State<MetricsPtr>,
    req: Request,
    next: Next,
) -> Response {
    // ---
    let start = Instant::now();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let method = req.method().to_string();

    let response = next.run(req).await;

    metrics.record_http_request(start, &path, &method, response.status().as_u16());
    response
}

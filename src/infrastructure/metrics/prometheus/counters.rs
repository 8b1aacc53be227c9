use metrics::{counter, histogram};
use std::time::Instant;

/// Track HTTP request latency and count, labelled by route and outcome.
pub fn track_http_request(start: Instant, path: &str, method: &str, status: u16) {
    let elapsed = start.elapsed();
    let labels = [
        ("path", path.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    histogram!("http_request_duration_seconds", &labels).record(elapsed);
    counter!("http_requests_total", &labels).increment(1);
}

/// Increment a counter for requests refused by the rate limiter.
pub fn increment_rate_limited() {
    counter!("rate_limited_requests_total").increment(1);
}

/// Increment a counter for issued tokens.
pub fn increment_token_issued(scope: &str) {
    counter!("tokens_issued_total", "scope" => scope.to_string()).increment(1);
}

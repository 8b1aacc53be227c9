//! Request-processing stages.
//!
//! Cross-cutting request handling is an ordered list of [`Stage`]s run by a
//! [`Pipeline`]. Each stage either lets the request through or answers it on
//! the spot. Headers a stage wants on the final response (`Vary`, CORS) are
//! collected on the side and appended to whatever response leaves the
//! pipeline, whether a stage produced it or the handler did.
//!
//! The global chain, outermost first:
//!
//! ```text
//! panic_guard -> track_metrics -> [RateLimit, Cors, Authenticate] -> [gate] -> handler
//! ```

mod authenticate;
mod cors;
mod gates;
mod identity;
mod metrics;
mod panic_guard;
mod rate_limit;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

pub use authenticate::Authenticate;
pub use cors::Cors;
pub use gates::{RequireActivated, RequireAuthenticated};
pub use identity::CurrentUser;
pub use metrics::track_metrics;
pub use panic_guard::panic_guard;
pub use rate_limit::{RateLimit, RateLimiter};

/// Outcome of one stage.
pub enum Flow {
    /// Hand the request to the next stage.
    Continue,
    /// Stop here and send this response.
    Respond(Response),
}

impl From<AppError> for Flow {
    fn from(err: AppError) -> Self {
        // ---
        Flow::Respond(err.into_response())
    }
}

#[async_trait::async_trait]
pub trait Stage: Send + Sync {
    // ---
    /// Inspect or annotate `req`; `headers` are appended to the eventual response.
    async fn process(&self, req: &mut Request, headers: &mut HeaderMap) -> Flow;
}

/// Ordered stages, run front to back before the wrapped service.
#[derive(Clone, Default)]
pub struct Pipeline {
    // ---
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Append `stage` to the end of the pipeline.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        // ---
        self.stages.push(Arc::new(stage));
        self
    }

    pub async fn run(&self, mut req: Request, next: Next) -> Response {
        // ---
        let mut headers = HeaderMap::new();

        for stage in &self.stages {
            if let Flow::Respond(response) = stage.process(&mut req, &mut headers).await {
                return with_headers(response, &headers);
            }
        }

        with_headers(next.run(req).await, &headers)
    }
}

/// Adapter for `axum::middleware::from_fn_with_state`.
pub async fn run_pipeline(State(pipeline): State<Pipeline>, req: Request, next: Next) -> Response {
    // ---
    pipeline.run(req, next).await
}

fn with_headers(mut response: Response, headers: &HeaderMap) -> Response {
    // ---
    let target = response.headers_mut();
    for (name, value) in headers {
        target.append(name.clone(), value.clone());
    }
    response
}

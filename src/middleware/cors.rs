use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;

use super::{Flow, Stage};

const ALLOWED_METHODS: &str = "OPTIONS, PUT, PATCH, DELETE";
const ALLOWED_HEADERS: &str = "Authorization, Content-Type";

/// Cross-origin negotiation against an exact-match allow-list.
pub struct Cors {
    // ---
    trusted_origins: Vec<String>,
}

impl Cors {
    // ---
    pub fn new(trusted_origins: &[String]) -> Self {
        // ---
        Self {
            trusted_origins: trusted_origins.to_vec(),
        }
    }

    fn is_trusted(&self, origin: &str) -> bool {
        // ---
        self.trusted_origins.iter().any(|trusted| trusted == origin)
    }
}

#[async_trait::async_trait]
impl Stage for Cors {
    // ---
    async fn process(&self, req: &mut Request, headers: &mut HeaderMap) -> Flow {
        // ---
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
        headers.append(
            header::VARY,
            HeaderValue::from_static("Access-Control-Request-Method"),
        );

        let Some(origin) = req.headers().get(header::ORIGIN) else {
            return Flow::Continue;
        };
        let trusted = origin.to_str().map(|o| self.is_trusted(o)).unwrap_or(false);
        if !trusted {
            return Flow::Continue;
        }

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());

        let preflight = req.method() == Method::OPTIONS
            && req
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
        if !preflight {
            return Flow::Continue;
        }

        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        Flow::Respond(StatusCode::OK.into_response())
    }
}

// Test helpers are intentionally partially used
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use bookclub_api::domain::{MailTemplate, Mailer};
use bookclub_api::{
    create_noop_metrics, create_router, AppConfig, AppState, InMemoryRepository, LimiterConfig,
};
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;

pub const PASSWORD: &str = "pa55word-pa55word";

// ============================================================================
// Recording mailer
// ============================================================================

#[derive(Debug, Clone)]
pub struct SentMail {
    pub recipient: String,
    pub template: MailTemplate,
    pub data: Value,
}

/// Mailer that keeps every message so tests can read the tokens in them.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    // ---
    pub fn sent(&self) -> Vec<SentMail> {
        // ---
        self.sent.lock().unwrap().clone()
    }

    /// Value of `key` in the most recent `template` mail sent to `recipient`.
    pub fn last_value(&self, recipient: &str, template: MailTemplate, key: &str) -> Option<String> {
        // ---
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.recipient == recipient && m.template == template)
            .and_then(|m| m.data[key].as_str().map(str::to_string))
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, recipient: &str, template: MailTemplate, data: Value) -> anyhow::Result<()> {
        // ---
        self.sent.lock().unwrap().push(SentMail {
            recipient: recipient.to_string(),
            template,
            data,
        });
        Ok(())
    }
}

// ============================================================================
// Test Setup
// ============================================================================

/// Configuration for in-process tests: in-memory store, limiter off.
pub fn test_config() -> AppConfig {
    // ---
    let mut config = AppConfig::default();
    config.database.database_url = "memory".to_string();
    config.limiter = LimiterConfig {
        enabled: false,
        ..LimiterConfig::default()
    };
    config.cors.trusted_origins = vec!["https://readers.example".to_string()];
    config
}

/// Router plus handles on everything behind it.
pub struct TestApp {
    pub state: AppState,
    pub repo: Arc<InMemoryRepository>,
    pub mailer: Arc<RecordingMailer>,
    pub router: Router,
    pub peer: SocketAddr,
}

impl TestApp {
    // ---
    pub fn new() -> Self {
        // ---
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        // ---
        let repo = Arc::new(InMemoryRepository::new());
        let mailer = Arc::new(RecordingMailer::default());
        let metrics = create_noop_metrics().expect("noop metrics");

        let state = AppState::new(config, repo.clone(), mailer.clone(), metrics);
        let router = create_router(state.clone());

        Self {
            state,
            repo,
            mailer,
            router,
            peer: "203.0.113.7:50000".parse().unwrap(),
        }
    }

    /// Send one request through the full middleware chain.
    pub async fn send(&self, req: Request<Body>) -> Response {
        // ---
        self.send_from(self.peer, req).await
    }

    /// Like [`TestApp::send`], as if the connection came from `peer`.
    pub async fn send_from(&self, peer: SocketAddr, mut req: Request<Body>) -> Response {
        // ---
        req.extensions_mut().insert(ConnectInfo(peer));
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        // ---
        self.send(request(Method::GET, uri, None, token)).await
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value, token: Option<&str>) -> Response {
        // ---
        self.send(request(method, uri, Some(body), token)).await
    }

    /// Wait for mail dispatch and other detached work to finish.
    pub async fn settle(&self) {
        // ---
        self.state
            .background()
            .drain(Duration::from_secs(5))
            .await
            .expect("background work should drain");
    }

    /// Register `email`, returning the new user's JSON.
    pub async fn register(&self, username: &str, email: &str) -> Value {
        // ---
        let body = serde_json::json!({ "username": username, "email": email, "password": PASSWORD });
        let response = self.json(Method::POST, "/api/v1/users", body, None).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await
    }

    /// Activate `email` with the token from its welcome mail.
    pub async fn activate(&self, email: &str) {
        // ---
        self.settle().await;
        let token = self
            .mailer
            .last_value(email, MailTemplate::UserWelcome, "activationToken")
            .expect("welcome mail with activation token");

        let response = self
            .json(Method::PUT, "/api/v1/users/activated", serde_json::json!({ "token": token }), None)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Log in as `email`, returning the bearer token plaintext.
    pub async fn login(&self, email: &str) -> String {
        // ---
        let body = serde_json::json!({ "email": email, "password": PASSWORD });
        let response = self
            .json(Method::POST, "/api/v1/tokens/authentication", body, None)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        body["authenticationToken"]["token"]
            .as_str()
            .expect("token in response")
            .to_string()
    }

    /// Register, activate and log in; returns the bearer token.
    pub async fn activated_member(&self, username: &str, email: &str) -> String {
        // ---
        self.register(username, email).await;
        self.activate(email).await;
        self.login(email).await
    }
}

pub fn request(method: Method, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    // ---
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_json(response: Response) -> Value {
    // ---
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("JSON body")
}

pub fn sample_book() -> Value {
    // ---
    serde_json::json!({
        "title": "The Fellowship of the Ring",
        "author": "J. R. R. Tolkien",
        "isbn": "978-0-261-10235-4",
        "pub_date": "1954-07-29",
        "genre": "fantasy",
        "description": "The first volume.",
        "avg_rating": 4.6
    })
}

// ============================================================================
// Real listener
// ============================================================================

pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
}

impl TestServer {
    // ---
    pub async fn new(state: AppState) -> Self {
        // ---
        let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Spawn the server in the background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = Client::new();

        Self { addr, client }
    }

    pub fn url(&self, path: &str) -> String {
        // ---
        format!("http://{}{}", self.addr, path)
    }
}

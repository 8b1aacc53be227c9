use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use bookclub_api::domain::{MailTemplate, Scope, TokenRepository, UserRepository, TOKEN_LENGTH};
use serde_json::json;
use tower::ServiceExt;

mod common;

use common::{body_json, request, sample_book, TestApp, PASSWORD};

const INVALID_TOKEN: &str = "invalid or missing authentication token";

// ============================================================================
// Anonymous access
// ============================================================================

#[tokio::test]
async fn anonymous_requests_reach_public_routes() {
    // ---
    let app = TestApp::new();

    let response = app.get("/api/v1/books", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let vary: Vec<_> = response
        .headers()
        .get_all(header::VARY)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(vary.contains(&"Authorization".to_string()));
    assert!(vary.contains(&"Origin".to_string()));

    let body = body_json(response).await;
    assert_eq!(body["books"], json!([]));
}

#[tokio::test]
async fn anonymous_is_refused_by_gated_routes() {
    // ---
    let app = TestApp::new();

    let response = app.get("/api/v1/users/me", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "you must be authenticated to access this resource");

    let response = app
        .json(Method::POST, "/api/v1/books", sample_book(), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Registration and activation
// ============================================================================

#[tokio::test]
async fn registration_mails_an_activation_token() {
    // ---
    let app = TestApp::new();

    let body = app.register("pippin", "pippin@tuckborough.example").await;

    assert_eq!(body["user"]["username"], "pippin");
    assert_eq!(body["user"]["activated"], false);
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("version").is_none());

    app.settle().await;
    let token = app
        .mailer
        .last_value(
            "pippin@tuckborough.example",
            MailTemplate::UserWelcome,
            "activationToken",
        )
        .unwrap();
    assert_eq!(token.len(), TOKEN_LENGTH);
}

#[tokio::test]
async fn registration_validates_input_and_rejects_duplicates() {
    // ---
    let app = TestApp::new();

    let response = app
        .json(
            Method::POST,
            "/api/v1/users",
            json!({ "username": "", "email": "not-an-email", "password": "short" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["username"], "must be provided");
    assert_eq!(body["error"]["email"], "must be a valid email address");
    assert_eq!(body["error"]["password"], "must be at least 8 bytes long");

    app.register("rosie", "rosie@bywater.example").await;
    let response = app
        .json(
            Method::POST,
            "/api/v1/users",
            json!({ "username": "rosie2", "email": "ROSIE@bywater.example", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["email"], "a user with this email address already exists");
}

#[tokio::test]
async fn activation_token_is_single_use() {
    // ---
    let app = TestApp::new();
    app.register("lobelia", "lobelia@hobbiton.example").await;
    app.settle().await;
    let token = app
        .mailer
        .last_value("lobelia@hobbiton.example", MailTemplate::UserWelcome, "activationToken")
        .unwrap();

    let response = app
        .json(Method::PUT, "/api/v1/users/activated", json!({ "token": token }), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["activated"], true);

    let response = app
        .json(Method::PUT, "/api/v1/users/activated", json!({ "token": token }), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body_json(response).await["error"]["token"],
        "invalid or expired activation token"
    );
}

// ============================================================================
// Authentication tokens
// ============================================================================

#[tokio::test]
async fn login_issues_a_fresh_well_formed_token() {
    // ---
    let app = TestApp::new();
    app.register("sam", "sam@bagshot.example").await;

    let first = app.login("sam@bagshot.example").await;
    let second = app.login("sam@bagshot.example").await;

    for token in [&first, &second] {
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
    assert_ne!(first, second);
}

#[tokio::test]
async fn bad_credentials_share_one_response() {
    // ---
    let app = TestApp::new();
    app.register("sam", "sam@bagshot.example").await;

    let wrong_password = app
        .json(
            Method::POST,
            "/api/v1/tokens/authentication",
            json!({ "email": "sam@bagshot.example", "password": "not-the-password" }),
            None,
        )
        .await;
    let unknown_email = app
        .json(
            Method::POST,
            "/api/v1/tokens/authentication",
            json!({ "email": "nobody@bagshot.example", "password": PASSWORD }),
            None,
        )
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(wrong_password).await, body_json(unknown_email).await);
}

#[tokio::test]
async fn bearer_token_identifies_the_caller() {
    // ---
    let app = TestApp::new();
    app.register("sam", "sam@bagshot.example").await;
    let token = app.login("sam@bagshot.example").await;

    let response = app.get("/api/v1/users/me", Some(&token)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["user"]["email"], "sam@bagshot.example");
}

#[tokio::test]
async fn malformed_authorization_is_rejected_even_on_public_routes() {
    // ---
    let app = TestApp::new();

    for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer a b", "Bearer short"] {
        let req = Request::builder()
            .uri("/api/v1/books")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();
        let response = app.send(req).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
    }
}

#[tokio::test]
async fn expired_token_is_an_auth_error_not_a_server_error() {
    // ---
    let app = TestApp::new();
    app.register("ted", "ted@sandyman.example").await;
    let user = app
        .repo
        .get_user_by_email("ted@sandyman.example")
        .await
        .unwrap()
        .unwrap();
    let expired = app
        .repo
        .issue_token(user.id, Duration::ZERO, Scope::Authentication)
        .await
        .unwrap();

    let response = app.get("/api/v1/users/me", Some(&expired.plaintext)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

#[tokio::test]
async fn reset_token_does_not_authenticate() {
    // ---
    let app = TestApp::new();
    app.register("ted", "ted@sandyman.example").await;
    let user = app
        .repo
        .get_user_by_email("ted@sandyman.example")
        .await
        .unwrap()
        .unwrap();
    let reset = app
        .repo
        .issue_token(user.id, Duration::from_secs(60), Scope::PasswordReset)
        .await
        .unwrap();

    let response = app.get("/api/v1/users/me", Some(&reset.plaintext)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], INVALID_TOKEN);
}

// ============================================================================
// Activation gate
// ============================================================================

#[tokio::test]
async fn inactive_user_is_forbidden_from_writes() {
    // ---
    let app = TestApp::new();
    app.register("gollum", "smeagol@gladden.example").await;
    let token = app.login("smeagol@gladden.example").await;

    let response = app
        .json(Method::POST, "/api/v1/books", sample_book(), Some(&token))
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await["error"],
        "your user account must be activated to access this resource"
    );

    // authenticated-only routes still work
    let response = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn password_reset_round_trip() {
    // ---
    let app = TestApp::new();
    app.activated_member("fatty", "fatty@bolger.example").await;

    let response = app
        .json(
            Method::POST,
            "/api/v1/tokens/password-reset",
            json!({ "email": "fatty@bolger.example" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["message"].is_string());

    app.settle().await;
    let reset = app
        .mailer
        .last_value("fatty@bolger.example", MailTemplate::PasswordReset, "passwordResetToken")
        .unwrap();

    let new_password = "second-breakfast-1";
    let response = app
        .json(
            Method::PUT,
            "/api/v1/users/password",
            json!({ "password": new_password, "token": reset }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // old password no longer works, new one does
    let old = app
        .json(
            Method::POST,
            "/api/v1/tokens/authentication",
            json!({ "email": "fatty@bolger.example", "password": PASSWORD }),
            None,
        )
        .await;
    assert_eq!(old.status(), StatusCode::UNAUTHORIZED);
    let new = app
        .json(
            Method::POST,
            "/api/v1/tokens/authentication",
            json!({ "email": "fatty@bolger.example", "password": new_password }),
            None,
        )
        .await;
    assert_eq!(new.status(), StatusCode::CREATED);

    // the reset token was consumed
    let again = app
        .json(
            Method::PUT,
            "/api/v1/users/password",
            json!({ "password": "third-breakfast-1", "token": reset }),
            None,
        )
        .await;
    assert_eq!(again.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn password_reset_is_mailed_to_inactive_accounts_too() {
    // ---
    let app = TestApp::new();
    app.register("hamfast", "gaffer@bagshot.example").await;

    let response = app
        .json(
            Method::POST,
            "/api/v1/tokens/password-reset",
            json!({ "email": "gaffer@bagshot.example" }),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    app.settle().await;
    let reset = app
        .mailer
        .last_value("gaffer@bagshot.example", MailTemplate::PasswordReset, "passwordResetToken")
        .expect("reset mail for an unactivated account");
    assert_eq!(reset.len(), TOKEN_LENGTH);
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_not_found() {
    // ---
    let app = TestApp::new();

    let response = app
        .json(
            Method::POST,
            "/api/v1/tokens/password-reset",
            json!({ "email": "nobody@nowhere.example" }),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    app.settle().await;
    assert!(app.mailer.sent().is_empty());
}

// ============================================================================
// Outer boundary
// ============================================================================

#[tokio::test]
async fn missing_peer_address_is_a_server_error() {
    // ---
    let app = TestApp::new();

    // bypass TestApp::send, which supplies the connection info
    let response = app
        .router
        .clone()
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};

use super::{Flow, Stage};
use crate::domain::{validate_token_plaintext, Identity, Scope, UserRepositoryPtr, Validator};
use crate::error::AppError;

/// Resolves the bearer token, if any, to an [`Identity`] in the request extensions.
///
/// A missing or empty `Authorization` header is not an error: the request
/// continues as [`Identity::Anonymous`]. Anything else must be exactly
/// `Bearer <token>` naming an unexpired authentication token. Malformed
/// headers, malformed tokens and unknown tokens all get the same rejection.
pub struct Authenticate {
    // ---
    users: UserRepositoryPtr,
}

impl Authenticate {
    // ---
    pub fn new(users: UserRepositoryPtr) -> Self {
        // ---
        Self { users }
    }
}

/// Pull the token out of `Bearer <token>`; `None` for any other shape.
fn bearer_token(value: &str) -> Option<&str> {
    // ---
    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        ["Bearer", token] => Some(*token),
        _ => None,
    }
}

#[async_trait::async_trait]
impl Stage for Authenticate {
    // ---
    async fn process(&self, req: &mut Request, headers: &mut HeaderMap) -> Flow {
        // ---
        headers.append(header::VARY, HeaderValue::from_static("Authorization"));

        let token = match req.headers().get(header::AUTHORIZATION) {
            None => None,
            Some(value) if value.is_empty() => None,
            Some(value) => {
                let Some(token) = value.to_str().ok().and_then(bearer_token) else {
                    tracing::debug!("Malformed Authorization header");
                    return AppError::InvalidAuthToken.into();
                };
                Some(token.to_string())
            }
        };

        let Some(token) = token else {
            req.extensions_mut().insert(Identity::Anonymous);
            return Flow::Continue;
        };

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, &token);
        if !v.is_valid() {
            tracing::debug!("Bearer token failed format check");
            return AppError::InvalidAuthToken.into();
        }

        match self.users.get_user_for_token(Scope::Authentication, &token).await {
            Ok(Some(user)) => {
                req.extensions_mut().insert(Identity::User(user));
                Flow::Continue
            }
            Ok(None) => {
                tracing::debug!("Bearer token unknown, expired, or out of scope");
                AppError::InvalidAuthToken.into()
            }
            Err(err) => AppError::ServerError(err.into()).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::domain::{NewUser, Password, TokenRepository, UserRepository, TOKEN_LENGTH};
    use crate::infrastructure::InMemoryRepository;
    use axum::body::Body;
    use std::sync::Arc;
    use std::time::Duration;

    fn request<S: AsRef<str>>(authorization: Option<S>) -> Request {
        // ---
        let mut builder = axum::http::Request::builder().uri("/api/v1/users/me");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value.as_ref());
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn setup() -> (Arc<InMemoryRepository>, Authenticate, String) {
        // ---
        let repo = Arc::new(InMemoryRepository::new());
        let user = repo
            .insert_user(NewUser {
                username: "bilbo".into(),
                email: "bilbo@shire.example".into(),
                password: Password::from_hash("$argon2id$placeholder"),
                activated: true,
            })
            .await
            .unwrap();
        let token = repo
            .issue_token(user.id, Duration::from_secs(60), Scope::Authentication)
            .await
            .unwrap();

        let stage = Authenticate::new(repo.clone());
        (repo, stage, token.plaintext)
    }

    async fn run(stage: &Authenticate, req: &mut Request) -> (Flow, HeaderMap) {
        // ---
        let mut headers = HeaderMap::new();
        let flow = stage.process(req, &mut headers).await;
        (flow, headers)
    }

    fn is_invalid_token(flow: &Flow) -> bool {
        // ---
        match flow {
            Flow::Respond(response) => {
                response.status() == axum::http::StatusCode::UNAUTHORIZED
                    && response.headers()[header::WWW_AUTHENTICATE] == "Bearer"
            }
            Flow::Continue => false,
        }
    }

    #[tokio::test]
    async fn missing_header_binds_anonymous() {
        // ---
        let (_, stage, _) = setup().await;

        for header_value in [None, Some("")] {
            let mut req = request(header_value);
            let (flow, headers) = run(&stage, &mut req).await;

            assert!(matches!(flow, Flow::Continue));
            assert!(req.extensions().get::<Identity>().unwrap().is_anonymous());
            assert_eq!(headers[header::VARY], "Authorization");
        }
    }

    #[tokio::test]
    async fn valid_token_binds_user() {
        // ---
        let (_, stage, token) = setup().await;
        let mut req = request(Some(&format!("Bearer {token}")));

        let (flow, _) = run(&stage, &mut req).await;

        assert!(matches!(flow, Flow::Continue));
        let identity = req.extensions().get::<Identity>().unwrap();
        assert_eq!(identity.user().map(|u| u.username.as_str()), Some("bilbo"));
    }

    #[tokio::test]
    async fn malformed_headers_are_rejected() {
        // ---
        let (_, stage, token) = setup().await;
        let cases = [
            format!("Token {token}"),
            format!("bearer {token}"),
            format!("Bearer  {token}"),
            format!("Bearer {token} extra"),
            token.clone(),
            "Bearer".to_string(),
        ];

        for value in &cases {
            let mut req = request(Some(value));
            let (flow, headers) = run(&stage, &mut req).await;

            assert!(is_invalid_token(&flow), "accepted {value:?}");
            assert!(req.extensions().get::<Identity>().is_none());
            assert_eq!(headers[header::VARY], "Authorization");
        }
    }

    #[tokio::test]
    async fn bad_format_and_unknown_tokens_look_the_same() {
        // ---
        let (_, stage, _) = setup().await;
        let unknown = "A".repeat(TOKEN_LENGTH);

        let (short, _) = run(&stage, &mut request(Some("Bearer abc"))).await;
        let (missing, _) = run(&stage, &mut request(Some(&format!("Bearer {unknown}")))).await;

        assert!(is_invalid_token(&short));
        assert!(is_invalid_token(&missing));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        // ---
        let (repo, stage, _) = setup().await;
        let user = repo
            .get_user_by_email("bilbo@shire.example")
            .await
            .unwrap()
            .unwrap();
        let expired = repo
            .issue_token(user.id, Duration::ZERO, Scope::Authentication)
            .await
            .unwrap();

        let mut req = request(Some(&format!("Bearer {}", expired.plaintext)));
        let (flow, _) = run(&stage, &mut req).await;

        assert!(is_invalid_token(&flow));
    }

    #[tokio::test]
    async fn wrong_scope_is_rejected() {
        // ---
        let (repo, stage, _) = setup().await;
        let user = repo
            .get_user_by_email("bilbo@shire.example")
            .await
            .unwrap()
            .unwrap();
        let reset = repo
            .issue_token(user.id, Duration::from_secs(60), Scope::PasswordReset)
            .await
            .unwrap();

        let mut req = request(Some(&format!("Bearer {}", reset.plaintext)));
        let (flow, _) = run(&stage, &mut req).await;

        assert!(is_invalid_token(&flow));
    }
}

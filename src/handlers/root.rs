use axum::response::IntoResponse;

pub async fn root_handler() -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    format!(
        r#"Welcome to the Book Club API 📚
Version: {version}

Available endpoints:
  - POST   /api/v1/users                   - Register a new user
  - PUT    /api/v1/users/activated         - Activate an account with its token
  - PUT    /api/v1/users/password          - Reset a password with a reset token
  - GET    /api/v1/users/me                - Show the authenticated user
  - POST   /api/v1/tokens/authentication   - Exchange credentials for a bearer token
  - POST   /api/v1/tokens/password-reset   - Request a password reset email
  - GET    /api/v1/books                   - List books (title, author, genre, sort, page, page_size)
  - GET    /api/v1/books/{{id}}              - Show a book
  - POST   /api/v1/books                   - Add a book (activated users)
  - PATCH  /api/v1/books/{{id}}              - Update a book (activated users)
  - DELETE /api/v1/books/{{id}}              - Delete a book (activated users)
  - GET    /health                         - Health check
  - GET    /metrics                        - Prometheus metrics

Authenticate with `Authorization: Bearer <token>`.
"#
    )
}

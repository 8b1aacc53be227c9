//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` holds the
//! configuration, the persistence traits, the mailer, metrics, the rate
//! limiter, and the background task supervisor.
//!
//! The state is cheaply cloneable (everything heavy sits behind an `Arc`) so
//! axum can hand a copy to every request.

use crate::background::BackgroundTasks;
use crate::config::AppConfig;
use crate::domain::{
    BookRepository, BookRepositoryPtr, MailerPtr, MetricsPtr, Scope, Token, TokenRepository,
    TokenRepositoryPtr, UserRepository, UserRepositoryPtr,
};
use crate::error::AppError;
use crate::middleware::RateLimiter;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the dependency injection container for the
/// application. Handlers depend on the repository traits, never on the
/// Postgres or in-memory implementations behind them.
///
/// # Lifecycle
///
/// 1. Created once at startup (or per test) with [`AppState::new`]
/// 2. Handed to [`crate::create_router`], which builds the middleware chain from it
/// 3. Cloned automatically by Axum for each incoming HTTP request
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    users: UserRepositoryPtr,
    tokens: TokenRepositoryPtr,
    books: BookRepositoryPtr,
    mailer: MailerPtr,
    metrics: MetricsPtr,
    limiter: Arc<RateLimiter>,
    background: BackgroundTasks,
}

impl AppState {
    // ---

    /// Build the state around one store implementing every repository trait.
    pub fn new<R>(config: AppConfig, repository: Arc<R>, mailer: MailerPtr, metrics: MetricsPtr) -> Self
    where
        R: UserRepository + TokenRepository + BookRepository + 'static,
    {
        // ---
        let limiter = Arc::new(RateLimiter::new(&config.limiter));

        AppState {
            config: Arc::new(config),
            users: repository.clone(),
            tokens: repository.clone(),
            books: repository,
            mailer,
            metrics,
            limiter,
            background: BackgroundTasks::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        // ---
        &self.config
    }

    pub fn users(&self) -> &UserRepositoryPtr {
        // ---
        &self.users
    }

    pub fn tokens(&self) -> &TokenRepositoryPtr {
        // ---
        &self.tokens
    }

    pub fn books(&self) -> &BookRepositoryPtr {
        // ---
        &self.books
    }

    pub fn mailer(&self) -> &MailerPtr {
        // ---
        &self.mailer
    }

    /// Get a reference to the metrics implementation.
    pub fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        // ---
        &self.limiter
    }

    /// Supervisor for work that must not delay the response.
    pub fn background(&self) -> &BackgroundTasks {
        // ---
        &self.background
    }

    /// Issue a token for `user_id` with the configured lifetime for `scope`.
    pub(crate) async fn issue_token(&self, user_id: i64, scope: Scope) -> Result<Token, AppError> {
        // ---
        let ttl = match scope {
            Scope::Activation => self.config.tokens.activation_ttl,
            Scope::Authentication => self.config.tokens.authentication_ttl,
            Scope::PasswordReset => self.config.tokens.password_reset_ttl,
        };

        let token = self.tokens.issue_token(user_id, ttl, scope).await?;
        self.metrics.record_token_issued(scope.as_str());

        Ok(token)
    }
}

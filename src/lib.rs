// src/lib.rs
use std::sync::Arc;

use anyhow::Result;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};
use tracing_subscriber::EnvFilter;

use handlers::*;
use middleware::{
    panic_guard, run_pipeline, track_metrics, Authenticate, Cors, Pipeline, RateLimit,
    RequireActivated, RequireAuthenticated,
};

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod background;
mod config;
mod error;
mod handlers;
mod infrastructure;
mod middleware;
mod server;

// Hoist up only the public symbol(s)
pub use app_state::AppState;
pub use background::BackgroundTasks;
pub use config::*;
pub use error::AppError;
pub use middleware::{Flow, RateLimiter, Stage};
pub use server::{serve, shutdown_signal};

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    connect_with_retry, // ---
    create_log_mailer,
    create_memory_repository,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    run_migrations,
    InMemoryRepository,
    LogMailer,
    PostgresRepository,
};

/// Install the global `tracing` subscriber.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`. Safe to call more
/// than once; later calls are ignored.
pub fn init_tracing() {
    // ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init().ok();
}

/// Assemble the application state for `config`.
///
/// `DATABASE_URL=memory` selects the in-process store; anything else is a
/// PostgreSQL URL, connected with retries and migrated before use.
pub async fn build_state(config: AppConfig) -> Result<AppState> {
    // ---
    let metrics = if config.server.metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };
    let mailer = create_log_mailer(&config.mail.sender);

    if config.database.is_memory() {
        tracing::warn!("Using the in-memory store; data will not survive a restart");
        let repository = Arc::new(create_memory_repository());
        return Ok(AppState::new(config, repository, mailer, metrics));
    }

    let pool = connect_with_retry(&config.database).await?;
    run_migrations(&pool).await?;
    let repository = Arc::new(create_postgres_repository(
        pool,
        config.database.query_timeout,
    ));

    Ok(AppState::new(config, repository, mailer, metrics))
}

/// Build the HTTP router and its middleware chain around `state`.
///
/// Every request passes, outermost first, through the panic guard, request
/// metrics, and the global pipeline (rate limit, CORS, authentication).
/// Routes that need a caller add a gate on top.
pub fn create_router(state: AppState) -> Router {
    // ---
    let global = Pipeline::new()
        .stage(RateLimit::new(
            state.limiter().clone(),
            state.metrics().clone(),
        ))
        .stage(Cors::new(&state.config().cors.trusted_origins))
        .stage(Authenticate::new(state.users().clone()));

    let require_authenticated = from_fn_with_state(
        Pipeline::new().stage(RequireAuthenticated),
        run_pipeline,
    );
    let require_activated =
        from_fn_with_state(Pipeline::new().stage(RequireActivated), run_pipeline);

    let api = Router::new()
        .route("/users", post(register_user))
        .route("/users/activated", put(activate_user))
        .route("/users/password", put(reset_password))
        .route(
            "/users/me",
            get(show_current_user).route_layer(require_authenticated),
        )
        .route("/tokens/authentication", post(create_authentication_token))
        .route("/tokens/password-reset", post(create_password_reset_token))
        .route(
            "/books",
            get(list_books).merge(post(create_book).route_layer(require_activated.clone())),
        )
        .route(
            "/books/{id}",
            get(show_book).merge(
                patch(update_book)
                    .delete(delete_book)
                    .route_layer(require_activated),
            ),
        );

    let metrics = state.metrics().clone();

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(from_fn_with_state(global, run_pipeline))
        .layer(from_fn_with_state(metrics, track_metrics))
        .layer(from_fn(panic_guard))
}

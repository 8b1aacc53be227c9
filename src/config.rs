// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
///
/// Missing configuration is treated as a deployment error,
/// not a recoverable runtime condition.
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub limiter: LimiterConfig,
    pub cors: CorsConfig,
    pub tokens: TokenConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            server: server::ServerConfig::from_env()?,
            database: database::DatabaseConfig::from_env()?,
            limiter: limiter::LimiterConfig::from_env()?,
            cors: cors::CorsConfig::from_env()?,
            tokens: tokens::TokenConfig::from_env()?,
            mail: mail::MailConfig::from_env()?,
        })
    }
}

// ============================================================
// Server configuration
// ============================================================

mod server {
    // ---
    use super::*;

    /// Listener, environment label, and shutdown behaviour.
    #[derive(Debug, Clone)]
    pub struct ServerConfig {
        /// Socket address the HTTP listener binds to. Defaults to 127.0.0.1:4000.
        pub bind_addr: String,

        /// Deployment environment label (development|staging|production).
        pub environment: String,

        /// Upper bound on waiting for background work during shutdown. Defaults to 30 seconds.
        pub drain_timeout: Duration,

        /// Metrics backend, `prom` or `noop`. Defaults to `noop`.
        pub metrics_type: String,
    }

    impl Default for ServerConfig {
        fn default() -> Self {
            // ---
            Self {
                bind_addr: "127.0.0.1:4000".to_string(),
                environment: "development".to_string(),
                drain_timeout: Duration::from_secs(30),
                metrics_type: "noop".to_string(),
            }
        }
    }

    impl ServerConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let defaults = Self::default();
            let drain_secs = optional_env_parse!("BOOKCLUB_SHUTDOWN_DRAIN_SEC", u64, 30);

            Ok(Self {
                bind_addr: std::env::var("BOOKCLUB_BIND_ADDR").unwrap_or(defaults.bind_addr),
                environment: std::env::var("BOOKCLUB_ENV").unwrap_or(defaults.environment),
                drain_timeout: Duration::from_secs(drain_secs),
                metrics_type: std::env::var("BOOKCLUB_METRICS_TYPE")
                    .unwrap_or(defaults.metrics_type),
            })
        }
    }
}
pub use server::ServerConfig;

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    ///
    /// This configuration is required for the service to function and
    /// is validated eagerly during startup.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string, or `memory` for the in-process store.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections to be open concurrently. Defaults to 15
        pub max_connections: u32,

        /// Upper bound on a single query. Defaults to 3 seconds.
        pub query_timeout: Duration,
    }

    impl Default for DatabaseConfig {
        fn default() -> Self {
            // ---
            Self {
                database_url: String::new(),
                retry_count: 50,
                acquire_timeout: Duration::from_secs(30),
                min_connections: 2,
                max_connections: 15,
                query_timeout: Duration::from_secs(3),
            }
        }
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        /// Startup will fail fast rather than continuing with incomplete
        /// or invalid configuration.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("BOOKCLUB_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("BOOKCLUB_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("BOOKCLUB_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("BOOKCLUB_DB_MAX_CONNECTIONS", u32, 15);
            let query_timeout_secs = optional_env_parse!("BOOKCLUB_DB_QUERY_TIMEOUT_SEC", u64, 3);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
                query_timeout: Duration::from_secs(query_timeout_secs),
            })
        }

        /// True when the service should run against the in-process store.
        pub fn is_memory(&self) -> bool {
            // ---
            self.database_url == "memory"
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Rate limiter configuration
// ============================================================

mod limiter {
    // ---
    use super::*;

    /// Per-client token bucket settings.
    #[derive(Debug, Clone)]
    pub struct LimiterConfig {
        /// When false every request is admitted.
        pub enabled: bool,

        /// Bucket refill rate in requests per second. Defaults to 2.
        pub rps: f64,

        /// Bucket capacity. Defaults to 5.
        pub burst: u32,
    }

    impl Default for LimiterConfig {
        fn default() -> Self {
            // ---
            Self {
                enabled: true,
                rps: 2.0,
                burst: 5,
            }
        }
    }

    impl LimiterConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let enabled = optional_env_parse!("BOOKCLUB_LIMITER_ENABLED", bool, true);
            let rps = optional_env_parse!("BOOKCLUB_LIMITER_RPS", f64, 2.0);
            let burst = optional_env_parse!("BOOKCLUB_LIMITER_BURST", u32, 5);

            if !rps.is_finite() || rps <= 0.0 {
                anyhow::bail!("BOOKCLUB_LIMITER_RPS must be a positive number, got {rps}");
            }

            Ok(Self {
                enabled,
                rps,
                burst,
            })
        }
    }
}
pub use limiter::LimiterConfig;

// ============================================================
// CORS configuration
// ============================================================

mod cors {
    // ---
    use super::*;

    /// Cross-origin settings.
    #[derive(Debug, Clone, Default)]
    pub struct CorsConfig {
        /// Origins allowed to read responses. Matched exactly, no wildcards.
        pub trusted_origins: Vec<String>,
    }

    impl CorsConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let trusted_origins = std::env::var("BOOKCLUB_CORS_TRUSTED_ORIGINS")
                .map(|raw| raw.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();

            Ok(Self { trusted_origins })
        }
    }
}
pub use cors::CorsConfig;

// ============================================================
// Token configuration
// ============================================================

mod tokens {
    // ---
    use super::*;

    /// Lifetimes for each token scope.
    #[derive(Debug, Clone)]
    pub struct TokenConfig {
        /// Lifetime of login tokens. Defaults to 24 hours.
        pub authentication_ttl: Duration,

        /// Lifetime of password-reset tokens. Defaults to 30 minutes.
        pub password_reset_ttl: Duration,

        /// Lifetime of account activation tokens. Defaults to 3 days.
        pub activation_ttl: Duration,
    }

    impl Default for TokenConfig {
        fn default() -> Self {
            // ---
            Self {
                authentication_ttl: Duration::from_secs(24 * 60 * 60),
                password_reset_ttl: Duration::from_secs(30 * 60),
                activation_ttl: Duration::from_secs(3 * 24 * 60 * 60),
            }
        }
    }

    impl TokenConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let auth_secs = optional_env_parse!("BOOKCLUB_AUTH_TOKEN_TTL_SEC", u64, 86_400);
            let reset_secs = optional_env_parse!("BOOKCLUB_RESET_TOKEN_TTL_SEC", u64, 1_800);
            let activation_secs =
                optional_env_parse!("BOOKCLUB_ACTIVATION_TOKEN_TTL_SEC", u64, 259_200);

            Ok(Self {
                authentication_ttl: Duration::from_secs(auth_secs),
                password_reset_ttl: Duration::from_secs(reset_secs),
                activation_ttl: Duration::from_secs(activation_secs),
            })
        }
    }
}
pub use tokens::TokenConfig;

// ============================================================
// Mail configuration
// ============================================================

mod mail {
    // ---
    use super::*;

    /// Outgoing mail identity.
    #[derive(Debug, Clone)]
    pub struct MailConfig {
        /// `From` header used for every message.
        pub sender: String,
    }

    impl Default for MailConfig {
        fn default() -> Self {
            // ---
            Self {
                sender: "Book Club Community <no-reply@bookclub.local>".to_string(),
            }
        }
    }

    impl MailConfig {
        pub fn from_env() -> Result<Self> {
            // ---
            let sender =
                std::env::var("BOOKCLUB_MAIL_SENDER").unwrap_or_else(|_| Self::default().sender);

            Ok(Self { sender })
        }
    }
}
pub use mail::MailConfig;

// ============================================================
// Tests
// ============================================================

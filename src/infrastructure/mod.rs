mod database;
mod mailer;
mod memory;
pub mod metrics;

// Re-export the factory functions for easy access
pub use database::{
    connect_with_retry, create_postgres_repository, run_migrations, PostgresRepository,
};
pub use mailer::{create as create_log_mailer, LogMailer};
pub use memory::{create_memory_repository, InMemoryRepository};
pub use metrics::{create_noop_metrics, create_prom_metrics};

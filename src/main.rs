use anyhow::Result;
use bookclub_api::{build_state, init_tracing, serve, shutdown_signal, AppConfig};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may already be populated.
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let endpoint = config.server.bind_addr.clone();

    tracing::info!(
        "Starting Book Club API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.server.environment
    );

    let state = build_state(config).await?;
    let listener = TcpListener::bind(&endpoint).await?;

    serve(listener, state, shutdown_signal()).await
}

//! Listener lifecycle: serve until a shutdown signal, then drain background work.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::app_state::AppState;
use crate::create_router;

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// In-flight requests finish first; background tasks then get up to the
/// configured drain timeout before this returns.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    // ---
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP server starting");

    let sweeper = state.limiter().spawn_sweeper();
    let background = state.background().clone();
    let drain_timeout = state.config().server.drain_timeout;

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    sweeper.abort();
    tracing::info!(
        "HTTP server stopped; draining {} background task(s)",
        background.in_flight()
    );
    background.drain(drain_timeout).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    // ---
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

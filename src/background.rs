//! Detached work that outlives the request that started it.
//!
//! Handlers hand follow-up work (mail dispatch) to [`BackgroundTasks::spawn`]
//! and return immediately. Failures and panics are logged, never surfaced to
//! the caller. On shutdown, [`BackgroundTasks::drain`] waits for whatever is
//! still in flight.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::FutureExt;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    // ---
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Supervisor for detached tasks with a shutdown barrier.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    // ---
    inner: Arc<Inner>,
}

/// Decrements the in-flight count when the task finishes, however it finishes.
struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        // ---
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Number of tasks spawned but not yet finished.
    pub fn in_flight(&self) -> usize {
        // ---
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Run `task` detached from the caller.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        // ---
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(Arc::clone(&self.inner));

        tokio::spawn(async move {
            let _guard = guard;

            match AssertUnwindSafe(task).catch_unwind().await {
                Ok(Ok(())) => tracing::debug!("Background task {} finished", name),
                Ok(Err(err)) => tracing::error!("Background task {} failed: {:#}", name, err),
                Err(payload) => {
                    tracing::error!(
                        "Background task {} panicked: {}",
                        name,
                        panic_message(payload.as_ref())
                    )
                }
            }
        });
    }

    /// Wait until no task is in flight, or fail once `timeout` elapses.
    pub async fn drain(&self, timeout: Duration) -> Result<()> {
        // ---
        let idle = async {
            loop {
                let notified = self.inner.idle.notified();
                let mut notified = std::pin::pin!(notified);

                // Register before checking so a wake-up between the two is not lost.
                notified.as_mut().enable();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(timeout, idle).await.map_err(|_| {
            anyhow!(
                "{} background task(s) still running after {:?}",
                self.in_flight(),
                timeout
            )
        })
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    // ---
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

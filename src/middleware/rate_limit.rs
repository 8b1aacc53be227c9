//! Per-client token bucket throttling.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use tokio::task::JoinHandle;

use super::{Flow, Stage};
use crate::config::LimiterConfig;
use crate::domain::MetricsPtr;
use crate::error::AppError;

/// How often idle clients are swept.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Clients not seen for longer than this are forgotten.
pub const STALE_AFTER: Duration = Duration::from_secs(3 * 60);

struct TokenBucket {
    // ---
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    // ---
    fn new(capacity: f64, now: Instant) -> Self {
        // ---
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, now: Instant, capacity: f64, refill_rate: f64) -> bool {
        // ---
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct Client {
    // ---
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Owns every client's bucket behind one lock.
///
/// The request path and the sweeper contend on the same mutex; both hold it
/// only for a map lookup or a single pass over the map.
pub struct RateLimiter {
    // ---
    enabled: bool,
    rps: f64,
    burst: f64,
    clients: Mutex<HashMap<IpAddr, Client>>,
}

impl RateLimiter {
    // ---
    pub fn new(config: &LimiterConfig) -> Self {
        // ---
        Self {
            enabled: config.enabled,
            rps: config.rps,
            burst: f64::from(config.burst),
            clients: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Client>> {
        // ---
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn admit(&self, client: IpAddr) -> bool {
        // ---
        self.admit_at(client, Instant::now())
    }

    /// Take one token from `client`'s bucket, creating the bucket on first sight.
    pub fn admit_at(&self, client: IpAddr, now: Instant) -> bool {
        // ---
        if !self.enabled {
            return true;
        }

        let mut clients = self.lock();
        let entry = clients.entry(client).or_insert_with(|| Client {
            bucket: TokenBucket::new(self.burst, now),
            last_seen: now,
        });

        entry.last_seen = now;
        entry.bucket.try_acquire(now, self.burst, self.rps)
    }

    /// Drop clients idle for longer than [`STALE_AFTER`].
    pub fn sweep_at(&self, now: Instant) {
        // ---
        let mut clients = self.lock();
        let before = clients.len();

        clients.retain(|_, c| now.saturating_duration_since(c.last_seen) <= STALE_AFTER);

        let removed = before - clients.len();
        if removed > 0 {
            tracing::debug!("Rate limiter swept {} idle client(s)", removed);
        }
    }

    pub fn tracked_clients(&self) -> usize {
        // ---
        self.lock().len()
    }

    /// Start the periodic sweep.
    ///
    /// The task holds only a weak reference and exits once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        // ---
        self.spawn_sweeper_every(SWEEP_INTERVAL)
    }

    /// [`RateLimiter::spawn_sweeper`] with an explicit period. The first sweep
    /// runs one full `period` after spawning.
    pub fn spawn_sweeper_every(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        // ---
        let limiter = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };
                limiter.sweep_at(Instant::now());
            }
            tracing::debug!("Rate limiter sweeper stopped");
        })
    }
}

/// Pipeline stage keyed by the peer IP address.
pub struct RateLimit {
    // ---
    limiter: Arc<RateLimiter>,
    metrics: MetricsPtr,
}

impl RateLimit {
    // ---
    pub fn new(limiter: Arc<RateLimiter>, metrics: MetricsPtr) -> Self {
        // ---
        Self { limiter, metrics }
    }
}

#[async_trait::async_trait]
impl Stage for RateLimit {
    // ---
    async fn process(&self, req: &mut Request, _headers: &mut HeaderMap) -> Flow {
        // ---
        let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
            return AppError::ServerError(anyhow!("peer address unavailable for rate limiting"))
                .into();
        };
        let client = peer.ip();

        if self.limiter.admit(client) {
            return Flow::Continue;
        }

        tracing::warn!("Rate limit exceeded for {}", client);
        self.metrics.record_rate_limited();
        AppError::RateLimitExceeded.into()
    }
}

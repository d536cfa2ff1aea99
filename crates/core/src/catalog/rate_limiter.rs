//! Token bucket rate limiter shared by every catalog request in the process.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::debug;

use super::CatalogError;
use crate::metrics;

/// Point-in-time view of the limiter.
#[derive(Debug, Clone)]
pub struct RateLimitStatus {
    pub requests_per_minute: u32,
    /// Whole and fractional slots left in the bucket.
    pub available: f32,
    /// Time until the next slot, when the bucket is empty.
    pub next_slot_in: Option<Duration>,
}

/// Request slots refilled continuously at `requests_per_minute / 60` per
/// second, up to one minute's worth.
pub struct TokenBucket {
    burst: f32,
    available: f32,
    per_second: f32,
    refilled_at: Instant,
}

impl TokenBucket {
    /// Starts full, so a fresh process may burst a full minute's quota.
    pub fn new(requests_per_minute: u32) -> Self {
        let burst = requests_per_minute.max(1) as f32;
        Self {
            burst,
            available: burst,
            per_second: burst / 60.0,
            refilled_at: Instant::now(),
        }
    }

    /// Take one slot, or report how long until one frees up.
    pub fn try_acquire(&mut self) -> Result<(), Duration> {
        self.refill();
        match self.time_to_next_slot() {
            None => {
                self.available -= 1.0;
                Ok(())
            }
            Some(wait) => Err(wait),
        }
    }

    pub fn status(&mut self) -> RateLimitStatus {
        self.refill();
        RateLimitStatus {
            requests_per_minute: self.burst as u32,
            available: self.available,
            next_slot_in: self.time_to_next_slot(),
        }
    }

    fn time_to_next_slot(&self) -> Option<Duration> {
        if self.available >= 1.0 {
            None
        } else {
            Some(Duration::from_secs_f32((1.0 - self.available) / self.per_second))
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.refilled_at).as_secs_f32();
        self.available = (self.available + elapsed * self.per_second).min(self.burst);
        self.refilled_at = now;
    }
}

/// Process-wide admission gate for catalog requests.
///
/// Callers over quota wait for a token instead of failing. Waiters queue on
/// the bucket's mutex, which admits them in FIFO order. A caller that would
/// wait longer than `max_wait` gets [`CatalogError::Throttled`].
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    max_wait: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, max_wait: Duration) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(requests_per_minute)),
            max_wait,
        }
    }

    /// Longest a caller may wait for admission.
    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Wait for a request slot. Returns how long the caller waited.
    ///
    /// The slot is charged on admission; dropping the request afterwards
    /// does not give it back.
    pub async fn acquire(&self) -> Result<Duration, CatalogError> {
        let start = Instant::now();

        let admitted = tokio::time::timeout(self.max_wait, async {
            let mut bucket = self.bucket.lock().await;
            loop {
                match bucket.try_acquire() {
                    Ok(()) => break,
                    Err(wait) => {
                        debug!(wait_ms = wait.as_millis() as u64, "Catalog rate limit reached, waiting");
                        sleep(wait).await;
                    }
                }
            }
        })
        .await;

        if admitted.is_err() {
            metrics::CATALOG_REQUESTS
                .with_label_values(&["throttled"])
                .inc();
            return Err(CatalogError::Throttled(self.max_wait));
        }

        let waited = start.elapsed();
        metrics::RATE_LIMIT_WAIT.observe(waited.as_secs_f64());
        Ok(waited)
    }

    pub async fn status(&self) -> RateLimitStatus {
        self.bucket.lock().await.status()
    }
}

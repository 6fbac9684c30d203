//! Global request rate limiting
//!
//! A single `RateLimiter` is shared (behind an `Arc`) by every component that
//! issues outbound traffic, so the configured rate holds process-wide.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Slowest supported rate; the interval of anything below it is clamped
pub const MIN_RATE_PER_SEC: f64 = 1e-6;

/// Interval-based limiter: at most `rate` operations per second
///
/// Idle time does not bank credit; a burst after a pause is still spaced
/// one interval apart starting from its first call.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Option<Duration>,
    next_allowed_at: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter; `rate_per_sec <= 0` disables limiting
    ///
    /// Positive rates below `MIN_RATE_PER_SEC` are raised to it.
    pub fn new(rate_per_sec: f64) -> Self {
        let interval = if rate_per_sec > 0.0 && rate_per_sec.is_finite() {
            Some(Duration::from_secs_f64(1.0 / rate_per_sec.max(MIN_RATE_PER_SEC)))
        } else {
            None
        };

        Self {
            interval,
            next_allowed_at: Mutex::new(None),
        }
    }

    /// A limiter that never waits
    pub fn unlimited() -> Self {
        Self::new(0.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Waits until the next request may be issued
    ///
    /// The lock is held across the sleep so concurrent callers queue up
    /// behind each other instead of computing the same slot.
    pub async fn wait(&self) {
        let Some(interval) = self.interval else {
            return;
        };

        let mut next = self.next_allowed_at.lock().await;
        let now = Instant::now();
        let allowed_at = next.unwrap_or(now);

        if allowed_at > now {
            tokio::time::sleep_until(allowed_at).await;
        }

        *next = Some(allowed_at.max(now) + interval);
    }
}

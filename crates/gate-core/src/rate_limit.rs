//! Per-source request rate limiting.
//!
//! Two independent policies protect the ingestion path:
//!
//! - a **baseline** fixed-window ceiling per (source key, route class) that
//!   steady traffic never hits, and
//! - a **burst** policy that trips only when the same key issues more than a
//!   configured count inside a short sub-window (default 10 requests in 3
//!   seconds), which catches rapid retry storms without penalizing normal
//!   polling.
//!
//! Windows are fixed, not sliding; the threat model here does not require
//! smoothing at the window boundary. Rejected requests advance no state
//! downstream of the limiter.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Endpoint class a request is charged against.
///
/// The webhook ingestion path and the read-only status surface carry
/// different ceilings, so buckets are keyed by class as well as source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    /// The protected webhook ingestion endpoint.
    Webhook,
    /// Health, readiness, and security status endpoints.
    Status,
}

/// Fixed-window policy: at most `max_requests` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

/// Error returned when a request exceeds a policy ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    LimitExceeded { retry_after_secs: u64 },

    #[error("burst detected, retry after {retry_after_secs}s")]
    BurstDetected { retry_after_secs: u64 },
}

impl RateLimitError {
    /// Suggested client back-off in seconds.
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            Self::LimitExceeded { retry_after_secs } => *retry_after_secs,
            Self::BurstDetected { retry_after_secs } => *retry_after_secs,
        }
    }
}

/// Counters for one (source, class) pair.
struct Bucket {
    count: u32,
    window_start: Instant,
    burst_count: u32,
    burst_start: Instant,
}

impl Bucket {
    fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            burst_count: 0,
            burst_start: now,
        }
    }
}

/// Fixed-window rate limiter with burst detection.
///
/// Thread-safe; buckets are read-and-mutated under one mutex because axum
/// handlers run concurrently.
pub struct RateLimiter {
    webhook_policy: RateLimitPolicy,
    status_policy: RateLimitPolicy,
    burst_policy: RateLimitPolicy,
    buckets: Mutex<HashMap<(String, RouteClass), Bucket>>,
}

impl RateLimiter {
    /// Create a limiter with explicit baseline policies per route class and
    /// a burst policy shared by both.
    pub fn new(
        webhook_policy: RateLimitPolicy,
        status_policy: RateLimitPolicy,
        burst_policy: RateLimitPolicy,
    ) -> Self {
        Self {
            webhook_policy,
            status_policy,
            burst_policy,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn policy_for(&self, class: RouteClass) -> RateLimitPolicy {
        match class {
            RouteClass::Webhook => self.webhook_policy,
            RouteClass::Status => self.status_policy,
        }
    }

    /// Charge one request from `key` against `class`.
    ///
    /// Returns `Ok(())` and records the request when admitted. Window
    /// counters reset whenever `now - window_start > window`.
    ///
    /// # Errors
    ///
    /// [`RateLimitError::LimitExceeded`] when the baseline ceiling is hit,
    /// [`RateLimitError::BurstDetected`] when the burst sub-window trips.
    /// Neither outcome advances any counter.
    pub fn check(&self, key: &str, class: RouteClass) -> Result<(), RateLimitError> {
        let now = Instant::now();
        let policy = self.policy_for(class);

        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let bucket = buckets
            .entry((key.to_string(), class))
            .or_insert_with(|| Bucket::new(now));

        // Fixed-window reset for both policies.
        if now.duration_since(bucket.window_start) > policy.window {
            bucket.count = 0;
            bucket.window_start = now;
        }
        if now.duration_since(bucket.burst_start) > self.burst_policy.window {
            bucket.burst_count = 0;
            bucket.burst_start = now;
        }

        if bucket.burst_count >= self.burst_policy.max_requests {
            warn!(key, ?class, "burst policy tripped");
            return Err(RateLimitError::BurstDetected {
                retry_after_secs: self.burst_policy.window.as_secs().max(1),
            });
        }

        if bucket.count >= policy.max_requests {
            warn!(
                key,
                ?class,
                count = bucket.count,
                max = policy.max_requests,
                "rate limit exceeded"
            );
            return Err(RateLimitError::LimitExceeded {
                retry_after_secs: policy.window.as_secs().max(1),
            });
        }

        bucket.count += 1;
        bucket.burst_count += 1;
        Ok(())
    }

    /// Remove buckets whose windows have fully elapsed.
    ///
    /// Called periodically to keep memory bounded under churning source keys.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        buckets.retain(|(_, class), bucket| {
            let window = match class {
                RouteClass::Webhook => self.webhook_policy.window,
                RouteClass::Status => self.status_policy.window,
            };
            now.duration_since(bucket.window_start) <= window
        });
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(
            // Generous baseline for steady webhook traffic.
            RateLimitPolicy::new(100, Duration::from_secs(60)),
            // Status endpoints are cheap; allow frequent polling.
            RateLimitPolicy::new(300, Duration::from_secs(60)),
            // Retry-storm protection: more than 10 requests in 3 seconds.
            RateLimitPolicy::new(10, Duration::from_secs(3)),
        )
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;

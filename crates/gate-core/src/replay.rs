//! Replay suppression for delivery identifiers.
//!
//! Delivery identifiers are sender-assigned and not cryptographically bound
//! to the payload, so this guard is a defense-in-depth layer behind
//! signature verification, not a substitute for it. An attacker who captures
//! a signed delivery cannot re-submit it within the retention window; after
//! the window the signature alone still has to hold.

use crate::DeliveryId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

/// Default retention window for seen delivery identifiers.
pub const DEFAULT_REPLAY_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Tracks delivery identifiers seen within a trailing window.
///
/// Thread-safe: lookups and maintenance share one mutex, so concurrent
/// handlers never observe torn state. Entries older than the window are
/// treated as absent on lookup and physically removed by [`purge_expired`],
/// which the service calls on a timer.
///
/// [`purge_expired`]: ReplayGuard::purge_expired
pub struct ReplayGuard {
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl ReplayGuard {
    /// Create a guard with the given retention window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Check whether a delivery identifier has been seen within the window,
    /// recording it if not.
    ///
    /// The first call for an identifier returns `false`; every subsequent
    /// call within the retention window returns `true`. An entry whose age
    /// exceeds the window is replaced and the call returns `false` again.
    pub fn is_replay(&self, delivery_id: &DeliveryId) -> bool {
        let now = Instant::now();
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        match seen.get(delivery_id.as_str()) {
            Some(first_seen) if now.duration_since(*first_seen) <= self.window => true,
            _ => {
                seen.insert(delivery_id.as_str().to_string(), now);
                false
            }
        }
    }

    /// Remove entries older than the retention window.
    ///
    /// Returns the number of entries removed. Safe to call concurrently with
    /// lookups.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let before = seen.len();
        seen.retain(|_, first_seen| now.duration_since(*first_seen) <= self.window);
        let removed = before - seen.len();

        if removed > 0 {
            debug!(removed, retained = seen.len(), "purged expired replay entries");
        }

        removed
    }

    /// Number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check whether the guard is tracking no identifiers.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW)
    }
}

#[cfg(test)]
#[path = "replay_tests.rs"]
mod tests;

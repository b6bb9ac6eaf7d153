//! Security audit trail.
//!
//! Every admission decision — signature verification, replay suppression,
//! rate limiting, IP filtering — is recorded here, denials and admissions
//! alike. The trail is a bounded in-memory ring: when full, the oldest event
//! is dropped to make room. It backs the security status endpoint and gives
//! operators a recent-history view without an external log pipeline.

use crate::{CorrelationId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::warn;

/// Default number of events the trail retains.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Severity of an audited security event.
///
/// Ordered: `Info < Warning < Critical`, so severity queries can use a
/// simple `>=` floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    Info,
    Warning,
    Critical,
}

/// Outcome of the audited check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Allowed,
    Denied,
    /// The check itself failed to execute; treated as a denial upstream.
    Error,
}

/// One recorded security decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityAuditEvent {
    pub timestamp: Timestamp,
    pub severity: AuditSeverity,
    /// Which check produced the event, e.g. `signature_verification`.
    pub check: String,
    pub result: AuditResult,
    /// Source address or key the decision applied to, when known.
    pub source: Option<String>,
    /// Delivery identifier, when the request carried one.
    pub delivery_id: Option<String>,
    pub correlation_id: CorrelationId,
    /// Free-form operator-facing detail. Never contains secrets or raw
    /// payload bytes.
    pub detail: String,
}

impl SecurityAuditEvent {
    pub fn new(
        severity: AuditSeverity,
        check: impl Into<String>,
        result: AuditResult,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Timestamp::now(),
            severity,
            check: check.into(),
            result,
            source: None,
            delivery_id: None,
            correlation_id: CorrelationId::new(),
            detail: detail.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_delivery_id(mut self, delivery_id: impl Into<String>) -> Self {
        self.delivery_id = Some(delivery_id.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// Bounded ring of [`SecurityAuditEvent`]s.
///
/// Thread-safe; recording and querying share one mutex. Capacity is fixed at
/// construction and the oldest event is dropped when the ring is full.
pub struct SecurityAuditTrail {
    capacity: usize,
    events: Mutex<VecDeque<SecurityAuditEvent>>,
}

impl SecurityAuditTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    /// Append an event, dropping the oldest when full.
    ///
    /// Critical events are additionally surfaced on the tracing pipeline so
    /// they are visible even when nobody polls the status endpoint.
    pub fn record(&self, event: SecurityAuditEvent) {
        if event.severity == AuditSeverity::Critical {
            warn!(
                check = %event.check,
                source = ?event.source,
                detail = %event.detail,
                "critical security event"
            );
        }

        let mut events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// The most recent `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<SecurityAuditEvent> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        events.iter().rev().take(limit).cloned().collect()
    }

    /// The most recent `limit` events at or above a severity floor, newest
    /// first.
    pub fn recent_with_severity(
        &self,
        floor: AuditSeverity,
        limit: usize,
    ) -> Vec<SecurityAuditEvent> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        events
            .iter()
            .rev()
            .filter(|e| e.severity >= floor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained events that were denials.
    pub fn denied_count(&self) -> usize {
        let events = self
            .events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        events
            .iter()
            .filter(|e| e.result == AuditResult::Denied)
            .count()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SecurityAuditTrail {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;

//! # Gate-Core
//!
//! Security and state-machine core for the Eval-Gate webhook quality gate.
//!
//! This crate contains everything that sits between the untrusted network
//! boundary and the privileged actions performed on a customer's behalf:
//! signature verification, replay suppression, rate limiting, source IP
//! admission, bounded in-memory state, artifact processing, and the
//! check-run lifecycle.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - Infrastructure implementations are injected at runtime
//! - All external dependencies are abstracted behind traits
//!
//! ## Usage
//!
//! ```rust
//! use gate_core::{CommitSha, DeliveryId};
//!
//! let sha = CommitSha::new("a".repeat(40)).unwrap();
//! let delivery = DeliveryId::new("d58ec9f0-1234-4cde-9f00-abc123def456").unwrap();
//! assert_eq!(sha.as_str().len(), 40);
//! assert!(!delivery.as_str().is_empty());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// Re-export commonly used types
pub use uuid::Uuid;

/// Standard result type for gate operations
pub type GateResult<T> = Result<T, GateError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Sender-assigned identifier for one webhook delivery.
///
/// Opaque to the gate; used only for replay suppression and log correlation.
/// GitHub sends a UUID, but the format is not contractual, so the only
/// validation applied is non-emptiness and a length ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeliveryId(String);

impl DeliveryId {
    /// Create a new delivery ID with validation.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "delivery_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "delivery_id".to_string(),
                max_length: 128,
            });
        }

        if !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ValidationError::InvalidCharacters {
                field: "delivery_id".to_string(),
                invalid_chars: "non-ASCII or whitespace".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DeliveryId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Git commit SHA referenced by a delivery.
///
/// Invariant: exactly 40 lowercase hexadecimal characters. Everything keyed
/// by commit (check-run tracking, per-SHA locking) relies on this having been
/// validated once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitSha(String);

impl CommitSha {
    /// Create a new commit SHA with validation.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.len() != 40 {
            return Err(ValidationError::InvalidFormat {
                field: "commit_sha".to_string(),
                message: format!("expected 40 hex characters, got {}", value.len()),
            });
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidCharacters {
                field: "commit_sha".to_string(),
                invalid_chars: "non-hexadecimal".to_string(),
            });
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines (first 12 characters).
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for CommitSha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommitSha {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// External check-run identifier assigned by the check-run API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckRunId(u64);

impl CheckRunId {
    /// Create new check-run ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CheckRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow run identifier assigned by the CI platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(u64);

impl RunId {
    /// Create new run ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time and Metadata Types
// ============================================================================

/// UTC timestamp with microsecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: format!("'{}' is not RFC3339", s),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Get duration since another timestamp
    pub fn duration_since(&self, other: Self) -> Duration {
        let chrono_duration = self.0.signed_duration_since(other.0);
        chrono_duration.to_std().unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

/// Identifier for tracing a delivery across system boundaries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate new correlation ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get string representation
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Top-level error type for gate operations
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Admission denied: {0}")]
    Admission(#[from] pipeline::AdmissionError),

    #[error("Payload error: {0}")]
    Payload(#[from] events::PayloadError),

    #[error("Artifact processing failed: {0}")]
    Artifact(#[from] artifact::ArtifactError),

    #[error("Check-run transition failed: {0}")]
    CheckRun(#[from] check_run::CheckRunError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },
}

impl GateError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Validation(_) => false,
            Self::Admission(_) => false,
            Self::Payload(_) => false,
            Self::Artifact(e) => e.is_transient(),
            Self::CheckRun(e) => e.is_transient(),
            Self::Configuration { .. } => false,
            Self::ExternalService { .. } => true,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Admission(_) => ErrorCategory::Security,
            Self::Payload(_) => ErrorCategory::Permanent,
            Self::Artifact(_) => ErrorCategory::Permanent,
            Self::CheckRun(e) => {
                if e.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::ExternalService { .. } => ErrorCategory::Transient,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook signature verification
pub mod signature;

/// Replay suppression for delivery identifiers
pub mod replay;

/// Per-source request rate limiting
pub mod rate_limit;

/// Source IP admission control
pub mod ip_filter;

/// Fixed-capacity state containers
pub mod bounded_state;

/// Security audit trail
pub mod audit;

/// Inbound delivery and payload model
pub mod events;

/// Evaluation artifact download and extraction
pub mod artifact;

/// Check-run lifecycle state machine
pub mod check_run;

/// Admission control chain and processing pipeline
pub mod pipeline;

/// Metrics collection seam
pub mod monitoring;

// Re-export key types for convenience
pub use artifact::{ArtifactError, ArtifactFetcher, ArtifactProcessor, ArtifactRef, EvaluationArtifact};
pub use audit::{AuditResult, AuditSeverity, SecurityAuditEvent, SecurityAuditTrail};
pub use bounded_state::BoundedMap;
pub use check_run::{
    CheckRunConclusion, CheckRunError, CheckRunReporter, CheckRunState, CheckRunTracker,
    TrackedCheckRun,
};
pub use events::{Delivery, GateEvent, PayloadError};
pub use ip_filter::{AllowedRangeSource, CidrRange, IpAdmissionFilter, RangeSourceError};
pub use monitoring::{MetricsCollector, NoOpMetricsCollector};
pub use pipeline::{
    AdmissionControl, AdmissionError, AdmissionToggles, CounterSnapshot, DeliveryPipeline,
    GateCounters,
};
pub use rate_limit::{RateLimitError, RateLimitPolicy, RateLimiter, RouteClass};
pub use replay::ReplayGuard;
pub use signature::{HmacSha256Verifier, SignatureError, SignatureVerifier};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

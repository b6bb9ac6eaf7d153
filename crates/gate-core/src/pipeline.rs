//! Admission chain and delivery processing pipeline.
//!
//! [`AdmissionControl`] is the gatekeeper between the network and everything
//! privileged: a delivery passes IP filtering, rate limiting, replay
//! suppression, and signature verification, in that order, before a single
//! payload byte is parsed. Each stage is pure in-memory work; a rejection
//! short-circuits the chain, records an audit event, and increments the
//! matching counter.
//!
//! [`DeliveryPipeline`] runs after admission and payload parsing. It drives
//! the check-run state machine for each typed event and guarantees that any
//! processing error still lands the affected commit in a completed, failed
//! check run with a sanitized message.

use crate::artifact::{ArtifactError, ArtifactProcessor};
use crate::audit::{AuditResult, AuditSeverity, SecurityAuditEvent, SecurityAuditTrail};
use crate::check_run::CheckRunTracker;
use crate::events::{Delivery, GateEvent};
use crate::ip_filter::IpAdmissionFilter;
use crate::rate_limit::{RateLimitError, RateLimiter, RouteClass};
use crate::replay::ReplayGuard;
use crate::signature::SignatureVerifier;
use crate::{BoundedMap, CommitSha, GateError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

// ============================================================================
// Admission
// ============================================================================

/// Rejection raised by an admission stage.
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    #[error("source address not allowed")]
    IpDenied,

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error("duplicate delivery")]
    Replay,

    #[error("signature verification failed")]
    SignatureInvalid,
}

impl AdmissionError {
    /// Stage label used in audit events and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::IpDenied => "ip_filter",
            Self::RateLimited(_) => "rate_limit",
            Self::Replay => "replay_guard",
            Self::SignatureInvalid => "signature_verification",
        }
    }
}

/// Feature switches for the optional admission stages.
///
/// Signature verification has no toggle; it is never optional.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionToggles {
    pub ip_filter_enabled: bool,
    pub rate_limit_enabled: bool,
    pub replay_enabled: bool,
}

impl Default for AdmissionToggles {
    fn default() -> Self {
        Self {
            ip_filter_enabled: true,
            rate_limit_enabled: true,
            replay_enabled: true,
        }
    }
}

/// Shared atomic counters surfaced by the health endpoint.
#[derive(Debug, Default)]
pub struct GateCounters {
    pub received: AtomicU64,
    pub admitted: AtomicU64,
    pub rejected_ip: AtomicU64,
    pub rejected_rate: AtomicU64,
    pub rejected_replay: AtomicU64,
    pub rejected_signature: AtomicU64,
    pub processed: AtomicU64,
    pub failed: AtomicU64,
}

/// Point-in-time copy of the counters for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct CounterSnapshot {
    pub received: u64,
    pub admitted: u64,
    pub rejected_ip: u64,
    pub rejected_rate: u64,
    pub rejected_replay: u64,
    pub rejected_signature: u64,
    pub processed: u64,
    pub failed: u64,
}

impl GateCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            received: self.received.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            rejected_ip: self.rejected_ip.load(Ordering::Relaxed),
            rejected_rate: self.rejected_rate.load(Ordering::Relaxed),
            rejected_replay: self.rejected_replay.load(Ordering::Relaxed),
            rejected_signature: self.rejected_signature.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn count_rejection(&self, error: &AdmissionError) {
        let counter = match error {
            AdmissionError::IpDenied => &self.rejected_ip,
            AdmissionError::RateLimited(_) => &self.rejected_rate,
            AdmissionError::Replay => &self.rejected_replay,
            AdmissionError::SignatureInvalid => &self.rejected_signature,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// The admission chain guarding the webhook endpoint.
pub struct AdmissionControl {
    ip_filter: Arc<IpAdmissionFilter>,
    rate_limiter: Arc<RateLimiter>,
    replay_guard: Arc<ReplayGuard>,
    verifier: Arc<dyn SignatureVerifier>,
    audit: Arc<SecurityAuditTrail>,
    counters: Arc<GateCounters>,
    toggles: AdmissionToggles,
}

impl AdmissionControl {
    pub fn new(
        ip_filter: Arc<IpAdmissionFilter>,
        rate_limiter: Arc<RateLimiter>,
        replay_guard: Arc<ReplayGuard>,
        verifier: Arc<dyn SignatureVerifier>,
        audit: Arc<SecurityAuditTrail>,
        counters: Arc<GateCounters>,
        toggles: AdmissionToggles,
    ) -> Self {
        Self {
            ip_filter,
            rate_limiter,
            replay_guard,
            verifier,
            audit,
            counters,
            toggles,
        }
    }

    pub fn toggles(&self) -> AdmissionToggles {
        self.toggles
    }

    /// Run a delivery through every enabled admission stage.
    ///
    /// Stages run in a fixed order and the first rejection wins. Admission
    /// performs no network I/O and parses no payload content; it is safe to
    /// run before anything else touches the request.
    ///
    /// # Errors
    ///
    /// The first [`AdmissionError`] a stage raises, already audited and
    /// counted by the time the caller sees it.
    pub fn admit(&self, delivery: &Delivery) -> Result<(), AdmissionError> {
        self.counters.received.fetch_add(1, Ordering::Relaxed);

        let result = self.run_stages(delivery);

        match &result {
            Ok(()) => {
                self.counters.admitted.fetch_add(1, Ordering::Relaxed);
                self.audit.record(self.event_for(
                    delivery,
                    AuditSeverity::Info,
                    "admission",
                    AuditResult::Allowed,
                    "delivery admitted",
                ));
            }
            Err(e) => {
                self.counters.count_rejection(e);
                let severity = match e {
                    AdmissionError::SignatureInvalid => AuditSeverity::Critical,
                    _ => AuditSeverity::Warning,
                };
                self.audit.record(self.event_for(
                    delivery,
                    severity,
                    e.stage(),
                    AuditResult::Denied,
                    e.to_string(),
                ));
                warn!(
                    delivery_id = %delivery.id,
                    stage = e.stage(),
                    "delivery rejected"
                );
            }
        }

        result
    }

    fn run_stages(&self, delivery: &Delivery) -> Result<(), AdmissionError> {
        if self.toggles.ip_filter_enabled {
            // No source address means the transport layer could not attribute
            // the request; with the filter on, that is a denial.
            let allowed = delivery
                .source_addr
                .is_some_and(|ip| self.ip_filter.is_allowed(ip));
            if !allowed {
                return Err(AdmissionError::IpDenied);
            }
        }

        if self.toggles.rate_limit_enabled {
            let key = delivery
                .source_addr
                .map_or_else(|| "unattributed".to_string(), |ip| ip.to_string());
            self.rate_limiter.check(&key, RouteClass::Webhook)?;
        }

        if self.toggles.replay_enabled && self.replay_guard.is_replay(&delivery.id) {
            return Err(AdmissionError::Replay);
        }

        let signature = delivery
            .signature
            .as_deref()
            .ok_or(AdmissionError::SignatureInvalid)?;
        self.verifier
            .verify(&delivery.body, signature)
            .map_err(|_| AdmissionError::SignatureInvalid)?;

        Ok(())
    }

    fn event_for(
        &self,
        delivery: &Delivery,
        severity: AuditSeverity,
        check: &str,
        result: AuditResult,
        detail: impl Into<String>,
    ) -> SecurityAuditEvent {
        let mut event = SecurityAuditEvent::new(severity, check, result, detail)
            .with_delivery_id(delivery.id.as_str());
        if let Some(ip) = delivery.source_addr {
            event = event.with_source(ip.to_string());
        }
        event
    }
}

// ============================================================================
// Processing
// ============================================================================

/// Number of recent processing errors retained for the status endpoint.
const RECENT_ERROR_CAPACITY: usize = 100;

/// Drives admitted, parsed events through the check-run state machine.
pub struct DeliveryPipeline {
    artifact_processor: Arc<ArtifactProcessor>,
    check_run_tracker: Arc<CheckRunTracker>,
    audit: Arc<SecurityAuditTrail>,
    counters: Arc<GateCounters>,
    recent_errors: std::sync::Mutex<BoundedMap<String, String>>,
}

impl DeliveryPipeline {
    pub fn new(
        artifact_processor: Arc<ArtifactProcessor>,
        check_run_tracker: Arc<CheckRunTracker>,
        audit: Arc<SecurityAuditTrail>,
        counters: Arc<GateCounters>,
    ) -> Self {
        Self {
            artifact_processor,
            check_run_tracker,
            audit,
            counters,
            recent_errors: std::sync::Mutex::new(BoundedMap::new(RECENT_ERROR_CAPACITY)),
        }
    }

    /// Process one typed event to its terminal outcome.
    ///
    /// For a completed workflow run this is: put the commit's check run in
    /// progress, evaluate the artifact, and complete the run. Any artifact
    /// failure completes the run as a failure with a sanitized message; only
    /// upstream check-run API failures propagate as errors.
    pub async fn process(&self, event: GateEvent) -> Result<(), GateError> {
        match event {
            GateEvent::WorkflowRunCompleted {
                run_id, head_sha, ..
            } => {
                self.evaluate_run(crate::RunId::new(run_id), &head_sha)
                    .await
            }
            GateEvent::CheckRunRequested { head_sha, .. } => {
                // A re-request resets the run to in_progress; the verdict
                // arrives with the re-run workflow's completion event.
                self.check_run_tracker
                    .ensure_in_progress(&head_sha)
                    .await
                    .map_err(|e| self.fail(GateError::CheckRun(e)))?;
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            GateEvent::Ping | GateEvent::Ignored => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    async fn evaluate_run(
        &self,
        run_id: crate::RunId,
        head_sha: &CommitSha,
    ) -> Result<(), GateError> {
        self.check_run_tracker
            .ensure_in_progress(head_sha)
            .await
            .map_err(|e| self.fail(GateError::CheckRun(e)))?;

        match self.artifact_processor.process(run_id).await {
            Ok(artifact) => {
                self.check_run_tracker
                    .complete_with_result(head_sha, &artifact)
                    .await
                    .map_err(|e| self.fail(GateError::CheckRun(e)))?;
                info!(
                    sha = %head_sha.short(),
                    passed = artifact.passed(),
                    "delivery processed"
                );
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(artifact_error) => {
                self.record_artifact_failure(head_sha, &artifact_error);

                // The commit still gets a terminal verdict; the run completes
                // as a failure carrying only the sanitized vocabulary.
                self.check_run_tracker
                    .complete_with_error(head_sha, artifact_error.sanitized_message())
                    .await
                    .map_err(|e| self.fail(GateError::CheckRun(e)))?;

                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    fn record_artifact_failure(&self, head_sha: &CommitSha, error: &ArtifactError) {
        error!(sha = %head_sha.short(), error = %error, "artifact evaluation failed");

        self.recent_errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                head_sha.as_str().to_string(),
                error.sanitized_message().to_string(),
            );

        self.audit.record(SecurityAuditEvent::new(
            AuditSeverity::Warning,
            "artifact_processing",
            AuditResult::Error,
            error.sanitized_message(),
        ));
    }

    fn fail(&self, error: GateError) -> GateError {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        error!(error = %error, "delivery processing failed");
        error
    }

    /// Recent sanitized processing errors, keyed by commit SHA.
    pub fn recent_errors(&self) -> Vec<(String, String)> {
        self.recent_errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

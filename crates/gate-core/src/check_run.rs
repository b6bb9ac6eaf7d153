//! Check-run state machine.
//!
//! Each commit SHA gets at most one check run, driven through a small state
//! machine: `Pending -> InProgress -> Completed{Success|Failure}`. The
//! tracker serializes all transitions for one SHA behind a per-SHA async
//! mutex, so a redelivered webhook never creates a second run and never
//! flips a terminal conclusion.

use crate::{BoundedMap, CheckRunId, CommitSha, EvaluationArtifact};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of SHAs tracked concurrently.
pub const DEFAULT_TRACKER_CAPACITY: usize = 10_000;

/// Error raised by a [`CheckRunReporter`].
#[derive(Debug, Clone, Error)]
pub enum CheckRunError {
    #[error("check run API call failed: {message}")]
    Api { message: String, transient: bool },
}

impl CheckRunError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Api { transient, .. } => *transient,
        }
    }
}

/// Lifecycle state of a tracked check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunState {
    Pending,
    InProgress,
    Completed,
}

/// Terminal verdict of a completed check run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckRunConclusion {
    Success,
    Failure,
}

/// Tracked state for one commit's check run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedCheckRun {
    pub id: CheckRunId,
    pub state: CheckRunState,
    pub conclusion: Option<CheckRunConclusion>,
}

/// Interface to the upstream check-run API.
///
/// Implementations are responsible for transport, auth, and timeouts; the
/// tracker owns sequencing and idempotency.
#[async_trait]
pub trait CheckRunReporter: Send + Sync {
    /// Create a check run for `sha` already in the `in_progress` state.
    async fn create_in_progress(
        &self,
        sha: &CommitSha,
        name: &str,
    ) -> Result<CheckRunId, CheckRunError>;

    /// Complete an existing check run with a conclusion and output text.
    async fn complete(
        &self,
        id: CheckRunId,
        conclusion: CheckRunConclusion,
        title: &str,
        summary: &str,
    ) -> Result<(), CheckRunError>;
}

type Slot = Arc<tokio::sync::Mutex<Option<TrackedCheckRun>>>;

/// Per-SHA check-run tracker.
///
/// The outer map is bounded; under sustained pressure the oldest SHA's slot
/// is evicted. An evicted SHA that reappears gets a fresh run created, which
/// is acceptable: eviction only occurs long after the commit left the active
/// working set.
pub struct CheckRunTracker {
    reporter: Arc<dyn CheckRunReporter>,
    check_name: String,
    slots: std::sync::Mutex<BoundedMap<CommitSha, Slot>>,
}

impl CheckRunTracker {
    pub fn new(
        reporter: Arc<dyn CheckRunReporter>,
        check_name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            reporter,
            check_name: check_name.into(),
            slots: std::sync::Mutex::new(BoundedMap::new(capacity)),
        }
    }

    /// Fetch or create the slot for a SHA. Cheap; the sync lock is only held
    /// for the map operation, never across an await point.
    fn slot_for(&self, sha: &CommitSha) -> Slot {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(slot) = slots.get(sha) {
            return Arc::clone(slot);
        }
        let slot: Slot = Arc::new(tokio::sync::Mutex::new(None));
        slots.insert(sha.clone(), Arc::clone(&slot));
        slot
    }

    /// Ensure a check run exists for `sha` and is at least `in_progress`.
    ///
    /// Idempotent: a second call for the same SHA returns the existing run's
    /// id without another create. Concurrent calls for the same SHA are
    /// serialized; exactly one performs the upstream create.
    pub async fn ensure_in_progress(&self, sha: &CommitSha) -> Result<CheckRunId, CheckRunError> {
        let slot = self.slot_for(sha);
        let mut guard = slot.lock().await;

        if let Some(run) = guard.as_ref() {
            debug!(sha = %sha.short(), id = %run.id, "reusing existing check run");
            return Ok(run.id);
        }

        let id = self
            .reporter
            .create_in_progress(sha, &self.check_name)
            .await?;
        info!(sha = %sha.short(), %id, "created check run");

        *guard = Some(TrackedCheckRun {
            id,
            state: CheckRunState::InProgress,
            conclusion: None,
        });
        Ok(id)
    }

    /// Complete the run for `sha` from an evaluated artifact.
    ///
    /// The conclusion is `success` iff the artifact passed its threshold.
    pub async fn complete_with_result(
        &self,
        sha: &CommitSha,
        artifact: &EvaluationArtifact,
    ) -> Result<(), CheckRunError> {
        let (conclusion, title) = if artifact.passed() {
            (CheckRunConclusion::Success, "Quality gate passed")
        } else {
            (CheckRunConclusion::Failure, "Quality gate failed")
        };
        let summary = format!(
            "Score {:.4} against threshold {:.4}.",
            artifact.score, artifact.threshold
        );

        self.complete(sha, conclusion, title, &summary).await
    }

    /// Complete the run for `sha` as a failure after a processing error.
    ///
    /// `sanitized_message` must come from the fixed external vocabulary;
    /// callers never pass raw error detail here.
    pub async fn complete_with_error(
        &self,
        sha: &CommitSha,
        sanitized_message: &str,
    ) -> Result<(), CheckRunError> {
        self.complete(
            sha,
            CheckRunConclusion::Failure,
            "Quality gate error",
            sanitized_message,
        )
        .await
    }

    async fn complete(
        &self,
        sha: &CommitSha,
        conclusion: CheckRunConclusion,
        title: &str,
        summary: &str,
    ) -> Result<(), CheckRunError> {
        let slot = self.slot_for(sha);
        let mut guard = slot.lock().await;

        // The slot may be empty when completion is requested without a prior
        // ensure (tracker eviction between phases). Create the run first so
        // the commit still ends with a visible verdict.
        let id = match guard.as_ref() {
            Some(run) if run.state == CheckRunState::Completed => {
                warn!(
                    sha = %sha.short(),
                    existing = ?run.conclusion,
                    requested = ?conclusion,
                    "check run already completed, conclusion unchanged"
                );
                return Ok(());
            }
            Some(run) => run.id,
            None => {
                self.reporter
                    .create_in_progress(sha, &self.check_name)
                    .await?
            }
        };

        self.reporter.complete(id, conclusion, title, summary).await?;
        info!(sha = %sha.short(), %id, ?conclusion, "completed check run");

        *guard = Some(TrackedCheckRun {
            id,
            state: CheckRunState::Completed,
            conclusion: Some(conclusion),
        });
        Ok(())
    }

    /// Current tracked state for a SHA, if any.
    pub fn get(&self, sha: &CommitSha) -> Option<TrackedCheckRun> {
        let slots = self
            .slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let slot = slots.get(sha)?;
        // try_lock: a held lock means a transition is mid-flight; report the
        // slot as unknown rather than blocking a sync caller.
        slot.try_lock().ok().and_then(|guard| guard.clone())
    }

    /// Number of SHAs currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for CheckRunTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckRunTracker")
            .field("check_name", &self.check_name)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "check_run_tests.rs"]
mod tests;

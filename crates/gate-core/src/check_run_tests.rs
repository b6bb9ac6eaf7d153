//! Tests for [`CheckRunTracker`].

use super::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const SHA_A: &str = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
const SHA_B: &str = "b3f0c7f6bb763af1be91d9e74eabfeb199dc1f1f";

fn sha(s: &str) -> CommitSha {
    CommitSha::new(s).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Create(String),
    Complete(CheckRunId, CheckRunConclusion, String),
}

/// Reporter that records every call and hands out sequential ids.
struct RecordingReporter {
    next_id: AtomicU64,
    calls: Mutex<Vec<Call>>,
}

impl RecordingReporter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(100),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create(_)))
            .count()
    }
}

#[async_trait]
impl CheckRunReporter for RecordingReporter {
    async fn create_in_progress(
        &self,
        sha: &CommitSha,
        _name: &str,
    ) -> Result<CheckRunId, CheckRunError> {
        let id = CheckRunId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(sha.as_str().to_string()));
        Ok(id)
    }

    async fn complete(
        &self,
        id: CheckRunId,
        conclusion: CheckRunConclusion,
        _title: &str,
        summary: &str,
    ) -> Result<(), CheckRunError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Complete(id, conclusion, summary.to_string()));
        Ok(())
    }
}

fn tracker(reporter: Arc<RecordingReporter>) -> CheckRunTracker {
    CheckRunTracker::new(reporter, "quality-gate", 100)
}

/// A repeated ensure for the same SHA reuses the run instead of creating a
/// second one.
#[tokio::test]
async fn test_ensure_is_idempotent_per_sha() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));

    let first = tracker.ensure_in_progress(&sha(SHA_A)).await.unwrap();
    let second = tracker.ensure_in_progress(&sha(SHA_A)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(reporter.create_count(), 1);
}

/// Distinct SHAs get distinct runs.
#[tokio::test]
async fn test_distinct_shas_get_distinct_runs() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));

    let a = tracker.ensure_in_progress(&sha(SHA_A)).await.unwrap();
    let b = tracker.ensure_in_progress(&sha(SHA_B)).await.unwrap();

    assert_ne!(a, b);
    assert_eq!(reporter.create_count(), 2);
}

/// Concurrent ensures for one SHA are serialized: exactly one create.
#[tokio::test]
async fn test_concurrent_ensures_create_once() {
    let reporter = RecordingReporter::new();
    let tracker = Arc::new(tracker(Arc::clone(&reporter)));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.ensure_in_progress(&sha(SHA_A)).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }

    assert!(ids.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(reporter.create_count(), 1);
}

/// A passing artifact completes the run as success with the score summary.
#[tokio::test]
async fn test_complete_with_passing_result() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));
    let commit = sha(SHA_A);

    let id = tracker.ensure_in_progress(&commit).await.unwrap();
    tracker
        .complete_with_result(
            &commit,
            &EvaluationArtifact {
                score: 0.95,
                threshold: 0.8,
            },
        )
        .await
        .unwrap();

    let calls = reporter.calls();
    assert!(matches!(
        &calls[1],
        Call::Complete(got, CheckRunConclusion::Success, summary)
            if *got == id && summary.contains("0.95")
    ));

    let tracked = tracker.get(&commit).unwrap();
    assert_eq!(tracked.state, CheckRunState::Completed);
    assert_eq!(tracked.conclusion, Some(CheckRunConclusion::Success));
}

/// A failing artifact completes the run as failure.
#[tokio::test]
async fn test_complete_with_failing_result() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));
    let commit = sha(SHA_A);

    tracker.ensure_in_progress(&commit).await.unwrap();
    tracker
        .complete_with_result(
            &commit,
            &EvaluationArtifact {
                score: 0.3,
                threshold: 0.8,
            },
        )
        .await
        .unwrap();

    let tracked = tracker.get(&commit).unwrap();
    assert_eq!(tracked.conclusion, Some(CheckRunConclusion::Failure));
}

/// Processing errors complete the run as failure with the sanitized text.
#[tokio::test]
async fn test_complete_with_error_is_failure() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));
    let commit = sha(SHA_A);

    tracker.ensure_in_progress(&commit).await.unwrap();
    tracker
        .complete_with_error(&commit, "artifact missing")
        .await
        .unwrap();

    let calls = reporter.calls();
    assert!(matches!(
        &calls[1],
        Call::Complete(_, CheckRunConclusion::Failure, summary) if summary == "artifact missing"
    ));
}

/// A terminal conclusion never changes; redelivery after completion is a
/// no-op upstream.
#[tokio::test]
async fn test_completed_run_is_terminal() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));
    let commit = sha(SHA_A);

    tracker.ensure_in_progress(&commit).await.unwrap();
    tracker
        .complete_with_result(
            &commit,
            &EvaluationArtifact {
                score: 1.0,
                threshold: 0.8,
            },
        )
        .await
        .unwrap();

    // Redelivered failure must not overwrite the success.
    tracker
        .complete_with_error(&commit, "artifact missing")
        .await
        .unwrap();
    let id = tracker.ensure_in_progress(&commit).await.unwrap();

    let tracked = tracker.get(&commit).unwrap();
    assert_eq!(tracked.conclusion, Some(CheckRunConclusion::Success));
    assert_eq!(tracked.id, id);
    // One create, one complete; nothing after the terminal transition.
    assert_eq!(reporter.calls().len(), 2);
}

/// Completion without a prior ensure still produces a visible verdict.
#[tokio::test]
async fn test_complete_without_prior_ensure_creates_run() {
    let reporter = RecordingReporter::new();
    let tracker = tracker(Arc::clone(&reporter));
    let commit = sha(SHA_A);

    tracker
        .complete_with_error(&commit, "internal error")
        .await
        .unwrap();

    assert_eq!(reporter.create_count(), 1);
    let tracked = tracker.get(&commit).unwrap();
    assert_eq!(tracked.state, CheckRunState::Completed);
}

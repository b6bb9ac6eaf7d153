//! Tests for [`ArtifactProcessor`].

use super::*;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::sync::Arc;

/// Build an in-memory gzip-compressed tar archive from (path, contents)
/// pairs.
fn archive(entries: &[(&str, &str)]) -> Bytes {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, contents) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, contents.as_bytes()).unwrap();
    }

    let encoder = builder.into_inner().unwrap();
    Bytes::from(encoder.finish().unwrap())
}

struct FakeFetcher {
    artifacts: Vec<ArtifactRef>,
    downloads: HashMap<u64, Bytes>,
    fail_download: bool,
}

impl FakeFetcher {
    fn with_archive(name: &str, bytes: Bytes) -> Arc<Self> {
        let artifact = ArtifactRef {
            id: 7,
            name: name.to_string(),
            size_in_bytes: bytes.len() as u64,
            expired: false,
        };
        Arc::new(Self {
            artifacts: vec![artifact],
            downloads: HashMap::from([(7, bytes)]),
            fail_download: false,
        })
    }
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn list_artifacts(&self, _run_id: RunId) -> Result<Vec<ArtifactRef>, ArtifactError> {
        Ok(self.artifacts.clone())
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Bytes, ArtifactError> {
        if self.fail_download {
            return Err(ArtifactError::Fetch {
                message: "simulated transport failure".to_string(),
            });
        }
        Ok(self.downloads.get(&artifact.id).cloned().unwrap())
    }
}

fn processor(fetcher: Arc<FakeFetcher>, threshold: f64) -> ArtifactProcessor {
    ArtifactProcessor::new(fetcher, "eval-results", "results.json", threshold)
}

/// The happy path: exact-name artifact, single result entry, passing score.
#[tokio::test]
async fn test_process_scores_passing_artifact() {
    let bytes = archive(&[("results.json", r#"{"score": 0.92}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let result = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap();

    assert_eq!(result.score, 0.92);
    assert!(result.passed());
}

/// A score exactly at the threshold passes.
#[tokio::test]
async fn test_score_at_threshold_passes() {
    let bytes = archive(&[("results.json", r#"{"score": 0.8}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let result = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap();
    assert!(result.passed());
}

/// A score below the threshold is a valid result that fails the gate.
#[tokio::test]
async fn test_score_below_threshold_fails() {
    let bytes = archive(&[("results.json", r#"{"score": 0.5}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let result = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap();
    assert!(!result.passed());
}

/// Only an exact artifact name matches.
#[tokio::test]
async fn test_partial_name_does_not_match() {
    let bytes = archive(&[("results.json", r#"{"score": 1.0}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results-extra", bytes);

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();

    assert!(matches!(err, ArtifactError::NotFound { .. }));
    assert_eq!(err.sanitized_message(), "artifact missing");
}

/// The result entry is found even when other entries precede it, and the
/// others are never parsed.
#[tokio::test]
async fn test_extracts_single_entry_among_many() {
    let bytes = archive(&[
        ("logs.txt", "lots of irrelevant log output"),
        ("nested-junk.bin", "\u{0}\u{1}\u{2}"),
        ("results.json", r#"{"score": 0.85}"#),
    ]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let result = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap();
    assert_eq!(result.score, 0.85);
}

/// An archive without the result entry is unreadable, not missing.
#[tokio::test]
async fn test_archive_missing_result_entry() {
    let bytes = archive(&[("other.json", r#"{"score": 1.0}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();

    assert!(matches!(err, ArtifactError::Unreadable { .. }));
    assert_eq!(err.sanitized_message(), "artifact unreadable");
}

/// Bytes that are not a gzip stream are rejected as unreadable.
#[tokio::test]
async fn test_corrupt_archive_is_unreadable() {
    let fetcher = FakeFetcher::with_archive("eval-results", Bytes::from_static(b"not an archive"));

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Unreadable { .. }));
}

/// A result file that is not the expected JSON shape is unreadable.
#[tokio::test]
async fn test_malformed_result_file() {
    let bytes = archive(&[("results.json", r#"{"grade": "A"}"#)]);
    let fetcher = FakeFetcher::with_archive("eval-results", bytes);

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();
    assert!(matches!(err, ArtifactError::Unreadable { .. }));
}

/// Expired artifacts are treated as absent.
#[tokio::test]
async fn test_expired_artifact_is_absent() {
    let bytes = archive(&[("results.json", r#"{"score": 1.0}"#)]);
    let mut fetcher = FakeFetcher::with_archive("eval-results", bytes);
    Arc::get_mut(&mut fetcher).unwrap().artifacts[0].expired = true;

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();
    assert!(matches!(err, ArtifactError::NotFound { .. }));
}

/// Transport failures surface with the sanitized upstream vocabulary.
#[tokio::test]
async fn test_download_failure_sanitized() {
    let bytes = archive(&[("results.json", r#"{"score": 1.0}"#)]);
    let mut fetcher = FakeFetcher::with_archive("eval-results", bytes);
    Arc::get_mut(&mut fetcher).unwrap().fail_download = true;

    let err = processor(fetcher, 0.8).process(RunId::new(1)).await.unwrap_err();
    assert_eq!(err.sanitized_message(), "upstream api failure");
}

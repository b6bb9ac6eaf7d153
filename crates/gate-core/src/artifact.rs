//! Evaluation artifact retrieval and scoring.
//!
//! A completed workflow run uploads an archive containing a result file with
//! a numeric score. This module locates that archive by exact name, extracts
//! only the result entry from the compressed stream, and compares the score
//! against the configured threshold.
//!
//! Absence of the artifact, an unreadable archive, or a malformed result
//! file are all **terminal**: the corresponding check run completes as a
//! failure and is not retried. A missing artifact means the workflow did not
//! produce evidence, and evidence does not appear by asking again.

use crate::RunId;
use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::Read;
use thiserror::Error;
use tracing::{debug, info};

/// Error raised while locating or reading the evaluation artifact.
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("no artifact named '{name}' on run {run_id}")]
    NotFound { name: String, run_id: RunId },

    #[error("artifact could not be read: {reason}")]
    Unreadable { reason: String },

    #[error("artifact fetch failed: {message}")]
    Fetch { message: String },
}

impl ArtifactError {
    /// Transport failures are classified transient for alerting purposes.
    /// The pipeline still treats every variant as terminal for the delivery
    /// that hit it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Fixed operator-facing vocabulary for externally visible messages.
    ///
    /// Internal detail stays in logs; nothing derived from upstream error
    /// bodies or payload content crosses the network boundary.
    pub fn sanitized_message(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "artifact missing",
            Self::Unreadable { .. } => "artifact unreadable",
            Self::Fetch { .. } => "upstream api failure",
        }
    }
}

/// A listed artifact on a workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub expired: bool,
}

/// The parsed evaluation result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationArtifact {
    pub score: f64,
    pub threshold: f64,
}

impl EvaluationArtifact {
    /// Score meets or exceeds the threshold. Values compare literally; no
    /// clamping or rounding.
    pub fn passed(&self) -> bool {
        self.score >= self.threshold
    }
}

/// Retrieval interface for workflow artifacts.
///
/// Implementations own their transport concerns, including bounded request
/// timeouts. The returned archive bytes are opaque to the fetcher.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactRef>, ArtifactError>;

    async fn download(&self, artifact: &ArtifactRef) -> Result<Bytes, ArtifactError>;
}

/// Shape of the result file inside the archive.
#[derive(Debug, Deserialize)]
struct ResultFile {
    score: f64,
}

/// Locates and scores the evaluation artifact for a workflow run.
pub struct ArtifactProcessor {
    fetcher: std::sync::Arc<dyn ArtifactFetcher>,
    artifact_name: String,
    result_file: String,
    threshold: f64,
}

impl ArtifactProcessor {
    pub fn new(
        fetcher: std::sync::Arc<dyn ArtifactFetcher>,
        artifact_name: impl Into<String>,
        result_file: impl Into<String>,
        threshold: f64,
    ) -> Self {
        Self {
            fetcher,
            artifact_name: artifact_name.into(),
            result_file: result_file.into(),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Fetch and score the evaluation artifact for `run_id`.
    ///
    /// The artifact is matched by exact name; partial or case-insensitive
    /// matches do not count. Expired artifacts are treated as absent.
    ///
    /// # Errors
    ///
    /// All variants of [`ArtifactError`] are terminal for the delivery that
    /// triggered the lookup.
    pub async fn process(&self, run_id: RunId) -> Result<EvaluationArtifact, ArtifactError> {
        let artifacts = self.fetcher.list_artifacts(run_id).await?;
        debug!(%run_id, count = artifacts.len(), "listed workflow artifacts");

        let target = artifacts
            .iter()
            .find(|a| a.name == self.artifact_name && !a.expired)
            .ok_or_else(|| ArtifactError::NotFound {
                name: self.artifact_name.clone(),
                run_id,
            })?;

        let archive = self.fetcher.download(target).await?;
        let result = self.extract_result(&archive)?;

        info!(
            %run_id,
            score = result.score,
            threshold = self.threshold,
            "scored evaluation artifact"
        );

        Ok(EvaluationArtifact {
            score: result.score,
            threshold: self.threshold,
        })
    }

    /// Pull the single result entry out of a gzip-compressed tar archive.
    ///
    /// Entries are visited in stream order; non-matching entries are skipped
    /// without being read into memory. Only the matching entry's bytes are
    /// materialized.
    fn extract_result(&self, archive: &[u8]) -> Result<ResultFile, ArtifactError> {
        let decoder = GzDecoder::new(archive);
        let mut tar = tar::Archive::new(decoder);

        let entries = tar.entries().map_err(|e| ArtifactError::Unreadable {
            reason: format!("invalid archive: {}", e),
        })?;

        for entry in entries {
            let mut entry = entry.map_err(|e| ArtifactError::Unreadable {
                reason: format!("corrupt archive entry: {}", e),
            })?;

            let path = entry.path().map_err(|e| ArtifactError::Unreadable {
                reason: format!("unreadable entry path: {}", e),
            })?;

            if path.to_str() != Some(self.result_file.as_str()) {
                continue;
            }

            let mut contents = String::new();
            entry
                .read_to_string(&mut contents)
                .map_err(|e| ArtifactError::Unreadable {
                    reason: format!("unreadable result entry: {}", e),
                })?;

            return serde_json::from_str(&contents).map_err(|e| ArtifactError::Unreadable {
                reason: format!("malformed result file: {}", e),
            });
        }

        Err(ArtifactError::Unreadable {
            reason: format!("archive has no entry named '{}'", self.result_file),
        })
    }
}

impl std::fmt::Debug for ArtifactProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactProcessor")
            .field("artifact_name", &self.artifact_name)
            .field("result_file", &self.result_file)
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;

//! Workflow artifact API operations.
//!
//! Implements [`gate_core::ArtifactFetcher`]: listing the artifacts of a
//! workflow run and downloading one archive as opaque bytes. Extraction and
//! scoring happen in gate-core; this module never looks inside the archive.

use crate::client::GitHubClient;
use crate::error::ApiError;
use async_trait::async_trait;
use bytes::Bytes;
use gate_core::{ArtifactError, ArtifactRef, RunId};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// One artifact entry as the API lists it.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowArtifact {
    pub id: u64,
    pub name: String,
    pub size_in_bytes: u64,
    pub expired: bool,
}

#[derive(Debug, Deserialize)]
struct ArtifactListResponse {
    artifacts: Vec<WorkflowArtifact>,
}

/// Artifact fetcher bound to one repository.
#[derive(Debug)]
pub struct ArtifactClient {
    client: Arc<GitHubClient>,
    owner: String,
    repo: String,
}

impl ArtifactClient {
    pub fn new(client: Arc<GitHubClient>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    async fn list(&self, run_id: RunId) -> Result<Vec<WorkflowArtifact>, ApiError> {
        let path = format!(
            "/repos/{}/{}/actions/runs/{}/artifacts",
            self.owner,
            self.repo,
            run_id.as_u64()
        );
        let url = self.client.endpoint(&path)?;

        let response = self
            .client
            .execute(self.client.request(reqwest::Method::GET, url), &path)
            .await?;

        let list: ArtifactListResponse =
            response.json().await.map_err(|e| ApiError::Serialization {
                message: e.to_string(),
            })?;

        debug!(%run_id, count = list.artifacts.len(), "listed artifacts");
        Ok(list.artifacts)
    }

    async fn download_archive(&self, artifact_id: u64) -> Result<Bytes, ApiError> {
        let path = format!(
            "/repos/{}/{}/actions/artifacts/{}/archive",
            self.owner, self.repo, artifact_id
        );
        let url = self.client.endpoint(&path)?;

        let response = self
            .client
            .execute(self.client.request(reqwest::Method::GET, url), &path)
            .await?;

        let bytes = response.bytes().await?;
        debug!(artifact_id, size = bytes.len(), "downloaded artifact archive");
        Ok(bytes)
    }
}

fn to_artifact_error(e: ApiError) -> ArtifactError {
    ArtifactError::Fetch {
        message: e.to_string(),
    }
}

#[async_trait]
impl gate_core::ArtifactFetcher for ArtifactClient {
    async fn list_artifacts(&self, run_id: RunId) -> Result<Vec<ArtifactRef>, ArtifactError> {
        let artifacts = self.list(run_id).await.map_err(to_artifact_error)?;

        Ok(artifacts
            .into_iter()
            .map(|a| ArtifactRef {
                id: a.id,
                name: a.name,
                size_in_bytes: a.size_in_bytes,
                expired: a.expired,
            })
            .collect())
    }

    async fn download(&self, artifact: &ArtifactRef) -> Result<Bytes, ArtifactError> {
        self.download_archive(artifact.id)
            .await
            .map_err(to_artifact_error)
    }
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;

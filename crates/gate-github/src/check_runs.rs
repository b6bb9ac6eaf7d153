//! Check-run API operations.
//!
//! Implements [`gate_core::CheckRunReporter`] over the repository check-run
//! endpoints: runs are created directly in the `in_progress` state and later
//! patched to `completed` with a conclusion and output text.

use crate::client::GitHubClient;
use crate::error::ApiError;
use async_trait::async_trait;
use gate_core::{CheckRunConclusion, CheckRunError, CheckRunId, CommitSha};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Request body for creating a check run.
#[derive(Debug, Clone, Serialize)]
pub struct CreateCheckRunRequest {
    pub name: String,
    pub head_sha: String,
    pub status: String,
}

/// Output block attached when completing a run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckRunOutput {
    pub title: String,
    pub summary: String,
}

/// Request body for completing a check run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCheckRunRequest {
    pub status: String,
    pub conclusion: String,
    pub output: CheckRunOutput,
}

/// The subset of the API's check-run object this service reads back.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRun {
    pub id: u64,
    pub status: String,
    pub conclusion: Option<String>,
}

fn conclusion_str(conclusion: CheckRunConclusion) -> &'static str {
    match conclusion {
        CheckRunConclusion::Success => "success",
        CheckRunConclusion::Failure => "failure",
    }
}

/// Check-run reporter bound to one repository.
#[derive(Debug)]
pub struct CheckRunClient {
    client: Arc<GitHubClient>,
    owner: String,
    repo: String,
}

impl CheckRunClient {
    pub fn new(client: Arc<GitHubClient>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    async fn create(&self, request: &CreateCheckRunRequest) -> Result<CheckRun, ApiError> {
        let path = format!("/repos/{}/{}/check-runs", self.owner, self.repo);
        let url = self.client.endpoint(&path)?;

        let response = self
            .client
            .execute(
                self.client.request(reqwest::Method::POST, url).json(request),
                &path,
            )
            .await?;

        let run: CheckRun = response.json().await.map_err(|e| ApiError::Serialization {
            message: e.to_string(),
        })?;

        debug!(id = run.id, sha = %request.head_sha, "created check run");
        Ok(run)
    }

    async fn update(&self, id: CheckRunId, request: &UpdateCheckRunRequest) -> Result<(), ApiError> {
        let path = format!(
            "/repos/{}/{}/check-runs/{}",
            self.owner,
            self.repo,
            id.as_u64()
        );
        let url = self.client.endpoint(&path)?;

        self.client
            .execute(
                self.client.request(reqwest::Method::PATCH, url).json(request),
                &path,
            )
            .await?;

        debug!(%id, conclusion = %request.conclusion, "updated check run");
        Ok(())
    }
}

fn to_check_run_error(e: ApiError) -> CheckRunError {
    CheckRunError::Api {
        transient: e.is_transient(),
        message: e.to_string(),
    }
}

#[async_trait]
impl gate_core::CheckRunReporter for CheckRunClient {
    async fn create_in_progress(
        &self,
        sha: &CommitSha,
        name: &str,
    ) -> Result<CheckRunId, CheckRunError> {
        let request = CreateCheckRunRequest {
            name: name.to_string(),
            head_sha: sha.as_str().to_string(),
            status: "in_progress".to_string(),
        };

        let run = self.create(&request).await.map_err(to_check_run_error)?;
        Ok(CheckRunId::new(run.id))
    }

    async fn complete(
        &self,
        id: CheckRunId,
        conclusion: CheckRunConclusion,
        title: &str,
        summary: &str,
    ) -> Result<(), CheckRunError> {
        let request = UpdateCheckRunRequest {
            status: "completed".to_string(),
            conclusion: conclusion_str(conclusion).to_string(),
            output: CheckRunOutput {
                title: title.to_string(),
                summary: summary.to_string(),
            },
        };

        self.update(id, &request).await.map_err(to_check_run_error)
    }
}

#[cfg(test)]
#[path = "check_runs_tests.rs"]
mod tests;

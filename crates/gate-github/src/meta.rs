//! Platform metadata operations.
//!
//! Implements [`gate_core::AllowedRangeSource`] over the `/meta` endpoint,
//! whose `hooks` field lists the CIDR ranges webhook deliveries originate
//! from.

use crate::client::GitHubClient;
use crate::error::ApiError;
use async_trait::async_trait;
use gate_core::{CidrRange, RangeSourceError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct MetaResponse {
    hooks: Vec<String>,
}

/// Range source backed by the platform metadata endpoint.
#[derive(Debug)]
pub struct MetaClient {
    client: Arc<GitHubClient>,
}

impl MetaClient {
    pub fn new(client: Arc<GitHubClient>) -> Self {
        Self { client }
    }

    async fn fetch_meta(&self) -> Result<MetaResponse, ApiError> {
        let url = self.client.endpoint("/meta")?;
        let response = self
            .client
            .execute(self.client.request(reqwest::Method::GET, url), "/meta")
            .await?;

        response.json().await.map_err(|e| ApiError::Serialization {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl gate_core::AllowedRangeSource for MetaClient {
    async fn fetch_ranges(&self) -> Result<Vec<CidrRange>, RangeSourceError> {
        let meta = self
            .fetch_meta()
            .await
            .map_err(|e| RangeSourceError::FetchFailed {
                message: e.to_string(),
            })?;

        // Individual unparseable entries are skipped so one new literal form
        // cannot take the filter down, but an entirely unusable list is an
        // error: replacing a working set with nothing would lock everyone
        // out on the next refresh.
        let mut ranges = Vec::with_capacity(meta.hooks.len());
        for entry in &meta.hooks {
            match entry.parse::<CidrRange>() {
                Ok(range) => ranges.push(range),
                Err(e) => warn!(entry, error = %e, "skipping unparseable hook range"),
            }
        }

        if ranges.is_empty() {
            return Err(RangeSourceError::MalformedResponse {
                message: "no parseable hook ranges in /meta response".to_string(),
            });
        }

        Ok(ranges)
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;

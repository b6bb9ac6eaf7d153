//! Low-level GitHub REST client.
//!
//! Owns the HTTP transport: base URL, authentication header, user agent, and
//! the per-request timeout every call inherits. Endpoint-specific clients
//! ([`check_runs`](crate::check_runs), [`artifacts`](crate::artifacts),
//! [`meta`](crate::meta)) layer their request/response types on top.

use crate::error::ApiError;
use std::time::Duration;
use url::Url;

/// Default REST endpoint.
const DEFAULT_API_URL: &str = "https://api.github.com";
/// Default per-request timeout; no call may hang the pipeline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`GitHubClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            user_agent: format!("eval-gate/{}", env!("CARGO_PKG_VERSION")),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = api_url;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Authenticated GitHub REST client.
pub struct GitHubClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
}

impl GitHubClient {
    /// Build a client from configuration and an access token.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(config: ClientConfig, token: String) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ApiError::Network {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            config,
            token,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Resolve a path against the configured base URL.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.config
            .api_url
            .join(path)
            .map_err(|e| ApiError::Serialization {
                message: format!("invalid endpoint path {:?}: {}", path, e),
            })
    }

    pub(crate) fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Execute a request and map non-success statuses to [`ApiError`].
    pub(crate) async fn execute(
        &self,
        builder: reqwest::RequestBuilder,
        resource: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder.send().await?;
        let status = response.status();

        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status.as_u16(), resource, body))
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.config.api_url.as_str())
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

//! Service configuration.
//!
//! Layered loading: an optional TOML file (`config/gate.toml` or the path in
//! `EG_CONFIG_FILE`) overridden by environment variables with the `EG`
//! prefix and `__` section separator, e.g. `EG__WEBHOOK__SECRET` or
//! `EG__QUEUE__MODE`.

use gate_queue::QueueMode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    pub github: GitHubConfig,
    #[serde(default)]
    pub gate: GateSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct WebhookConfig {
    /// Shared HMAC secret for signature verification.
    pub secret: String,
    /// Request body ceiling in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &"<REDACTED>")
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub ip_filter_enabled: bool,
    pub rate_limit_enabled: bool,
    pub replay_enabled: bool,
    pub replay_window_secs: u64,
    pub webhook_max_per_minute: u32,
    pub status_max_per_minute: u32,
    pub burst_max: u32,
    pub burst_window_secs: u64,
    pub audit_capacity: usize,
    pub ip_refresh_interval_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            ip_filter_enabled: true,
            rate_limit_enabled: true,
            replay_enabled: true,
            replay_window_secs: 3600,
            webhook_max_per_minute: 100,
            status_max_per_minute: 300,
            burst_max: 10,
            burst_window_secs: 3,
            audit_capacity: 1000,
            ip_refresh_interval_secs: 3600,
        }
    }
}

impl SecurityConfig {
    pub fn replay_window(&self) -> Duration {
        Duration::from_secs(self.replay_window_secs)
    }

    pub fn burst_window(&self) -> Duration {
        Duration::from_secs(self.burst_window_secs)
    }

    pub fn ip_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.ip_refresh_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// `required`, `fallback`, or `in_process`.
    pub mode: String,
    pub url: Option<String>,
    pub probe_timeout_secs: u64,
    pub receive_wait_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: "fallback".to_string(),
            url: None,
            probe_timeout_secs: 5,
            receive_wait_secs: 10,
        }
    }
}

impl QueueConfig {
    pub fn queue_mode(&self) -> Result<QueueMode, ConfigError> {
        match self.mode.as_str() {
            "required" => Ok(QueueMode::Required),
            "fallback" => Ok(QueueMode::Fallback),
            "in_process" => Ok(QueueMode::InProcess),
            other => Err(invalid(format!(
                "queue.mode must be 'required', 'fallback', or 'in_process', got {:?}",
                other
            ))),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn receive_wait(&self) -> Duration {
        Duration::from_secs(self.receive_wait_secs)
    }
}

#[derive(Clone, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<REDACTED>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub check_name: String,
    pub artifact_name: String,
    pub result_file: String,
    pub threshold: f64,
    pub tracker_capacity: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            check_name: "quality-gate".to_string(),
            artifact_name: "eval-results".to_string(),
            result_file: "results.json".to_string(),
            threshold: 0.8,
            tracker_capacity: 10_000,
        }
    }
}

impl GateConfig {
    /// Load configuration from file and environment layers.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("EG_CONFIG_FILE").unwrap_or_else(|_| "config/gate".to_string());

        let config: Self = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(config::Environment::with_prefix("EG").separator("__"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook.secret.is_empty() {
            return Err(invalid("webhook.secret must not be empty"));
        }
        if self.webhook.max_body_bytes == 0 {
            return Err(invalid("webhook.max_body_bytes must be positive"));
        }
        if self.github.token.is_empty() {
            return Err(invalid("github.token must not be empty"));
        }
        if self.github.owner.is_empty() || self.github.repo.is_empty() {
            return Err(invalid("github.owner and github.repo must be set"));
        }
        if !self.gate.threshold.is_finite() {
            return Err(invalid("gate.threshold must be a finite number"));
        }
        if self.gate.tracker_capacity == 0 {
            return Err(invalid("gate.tracker_capacity must be positive"));
        }
        if self.security.audit_capacity == 0 {
            return Err(invalid("security.audit_capacity must be positive"));
        }
        self.queue.queue_mode()?;
        if matches!(self.queue.queue_mode()?, QueueMode::Required) && self.queue.url.is_none() {
            return Err(invalid("queue.url is required when queue.mode = 'required'"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

//! GitHub API error taxonomy.

use thiserror::Error;

/// Errors from GitHub REST API operations.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("resource not found: {resource}")]
    NotFound { resource: String },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("authorization failed: insufficient permissions")]
    AuthorizationFailed,

    #[error("rate limited by GitHub")]
    RateLimited,

    #[error("HTTP {status}: {message}")]
    HttpError { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("response deserialization failed: {message}")]
    Serialization { message: String },
}

impl ApiError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NotFound { .. } => false,
            Self::AuthenticationFailed => false,
            Self::AuthorizationFailed => false,
            Self::RateLimited => true,
            Self::HttpError { status, .. } => *status >= 500,
            Self::Network { .. } => true,
            Self::Timeout => true,
            Self::Serialization { .. } => false,
        }
    }

    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status: u16, resource: &str, message: String) -> Self {
        match status {
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 => Self::NotFound {
                resource: resource.to_string(),
            },
            429 => Self::RateLimited,
            _ => Self::HttpError { status, message },
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Serialization {
                message: e.to_string(),
            }
        } else {
            Self::Network {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

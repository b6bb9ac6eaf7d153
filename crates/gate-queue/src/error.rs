//! Queue error taxonomy.

use thiserror::Error;

/// Errors from delivery queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("queue probe timed out after {timeout_secs}s")]
    ProbeTimeout { timeout_secs: u64 },

    #[error("failed to enqueue delivery: {message}")]
    SendFailed { message: String },

    #[error("failed to receive from queue: {message}")]
    ReceiveFailed { message: String },

    #[error("failed to complete message: {message}")]
    CompleteFailed { message: String },

    #[error("message serialization failed: {message}")]
    Serialization { message: String },

    #[error("queue configuration invalid: {message}")]
    Configuration { message: String },
}

impl QueueError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::ProbeTimeout { .. } => true,
            Self::SendFailed { .. } => true,
            Self::ReceiveFailed { .. } => true,
            Self::CompleteFailed { .. } => true,
            Self::Serialization { .. } => false,
            Self::Configuration { .. } => false,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

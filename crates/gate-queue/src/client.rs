//! Delivery queue trait and startup queue selection.
//!
//! The service decouples webhook intake from processing through a
//! [`DeliveryQueue`]. At startup the queue is **probed** with a bounded
//! timeout and the outcome is handled according to the configured
//! [`QueueMode`]; the service never silently pretends a queue exists.

use crate::error::QueueError;
use crate::message::QueuedDelivery;
use crate::providers::memory::InMemoryDeliveryQueue;
use crate::providers::sqs::SqsDeliveryQueue;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Default bounded timeout for the startup reachability probe. Independent
/// of the steady-state receive wait.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opaque handle for completing a received message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHandle(pub String);

/// Which backend a queue instance talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueProviderType {
    InMemory,
    Sqs,
}

/// Transport abstraction for admitted deliveries.
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
    /// Reachability check with a bounded timeout. Run once at startup.
    async fn probe(&self) -> Result<(), QueueError>;

    async fn enqueue(&self, delivery: QueuedDelivery) -> Result<(), QueueError>;

    /// Receive one message, waiting up to `wait` for one to arrive.
    async fn receive(
        &self,
        wait: Duration,
    ) -> Result<Option<(QueuedDelivery, ReceiptHandle)>, QueueError>;

    /// Acknowledge a processed message so it is not redelivered.
    async fn complete(&self, handle: ReceiptHandle) -> Result<(), QueueError>;

    fn provider_type(&self) -> QueueProviderType;
}

/// How to treat queue availability at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
    /// Production: a failed probe is fatal and the service refuses to start.
    Required,
    /// Development: a failed probe falls back to in-process synchronous
    /// handling with a WARN.
    Fallback,
    /// Explicitly synchronous in-process handling; no remote queue at all.
    InProcess,
}

/// Outcome of startup queue selection.
pub struct QueueConnection {
    pub queue: Arc<dyn DeliveryQueue>,
    /// `true` when deliveries are processed by a background worker;
    /// `false` when the webhook handler processes them inline.
    pub asynchronous: bool,
}

impl std::fmt::Debug for QueueConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueConnection")
            .field("asynchronous", &self.asynchronous)
            .finish_non_exhaustive()
    }
}

/// Select and probe the delivery queue for the configured mode.
///
/// # Errors
///
/// In [`QueueMode::Required`], a missing queue URL or a failed probe is an
/// error and startup must abort.
pub async fn connect_queue(
    mode: QueueMode,
    queue_url: Option<&str>,
    probe_timeout: Duration,
) -> Result<QueueConnection, QueueError> {
    match mode {
        QueueMode::InProcess => {
            info!("queue mode: in-process synchronous handling");
            Ok(QueueConnection {
                queue: Arc::new(InMemoryDeliveryQueue::new()),
                asynchronous: false,
            })
        }
        QueueMode::Required => {
            let url = queue_url.ok_or_else(|| QueueError::Configuration {
                message: "queue mode 'required' needs a queue URL".to_string(),
            })?;

            let queue = SqsDeliveryQueue::connect(url, probe_timeout).await?;
            queue.probe().await?;
            info!(queue_url = url, "queue probe succeeded");

            Ok(QueueConnection {
                queue: Arc::new(queue),
                asynchronous: true,
            })
        }
        QueueMode::Fallback => {
            if let Some(url) = queue_url {
                match SqsDeliveryQueue::connect(url, probe_timeout).await {
                    Ok(queue) => match queue.probe().await {
                        Ok(()) => {
                            info!(queue_url = url, "queue probe succeeded");
                            return Ok(QueueConnection {
                                queue: Arc::new(queue),
                                asynchronous: true,
                            });
                        }
                        Err(e) => {
                            error!(queue_url = url, error = %e, "queue probe failed");
                        }
                    },
                    Err(e) => {
                        error!(queue_url = url, error = %e, "queue connection failed");
                    }
                }
            }

            warn!("falling back to in-process synchronous delivery handling");
            Ok(QueueConnection {
                queue: Arc::new(InMemoryDeliveryQueue::new()),
                asynchronous: false,
            })
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

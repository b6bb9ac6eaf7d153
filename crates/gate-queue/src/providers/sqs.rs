//! SQS queue provider.
//!
//! Messages travel as the JSON wire form of [`QueuedDelivery`] in the SQS
//! message body. The startup probe is `GetQueueAttributes` under a bounded
//! timeout, so an unreachable queue is detected before the service accepts
//! traffic.

use crate::client::{DeliveryQueue, QueueProviderType, ReceiptHandle};
use crate::error::QueueError;
use crate::message::QueuedDelivery;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use std::time::Duration;
use tracing::debug;

/// SQS receive wait ceiling imposed by the service API.
const MAX_WAIT_SECONDS: i32 = 20;

/// Delivery queue over one SQS queue URL.
pub struct SqsDeliveryQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    probe_timeout: Duration,
}

impl SqsDeliveryQueue {
    /// Build a client against `queue_url` using ambient AWS configuration.
    pub async fn connect(queue_url: &str, probe_timeout: Duration) -> Result<Self, QueueError> {
        if queue_url.is_empty() {
            return Err(QueueError::Configuration {
                message: "queue URL must not be empty".to_string(),
            });
        }

        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let client = aws_sdk_sqs::Client::new(&config);

        Ok(Self {
            client,
            queue_url: queue_url.to_string(),
            probe_timeout,
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl DeliveryQueue for SqsDeliveryQueue {
    async fn probe(&self) -> Result<(), QueueError> {
        let request = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(aws_sdk_sqs::types::QueueAttributeName::QueueArn)
            .send();

        match tokio::time::timeout(self.probe_timeout, request).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(QueueError::ConnectionFailed {
                message: e.to_string(),
            }),
            Err(_) => Err(QueueError::ProbeTimeout {
                timeout_secs: self.probe_timeout.as_secs(),
            }),
        }
    }

    async fn enqueue(&self, delivery: QueuedDelivery) -> Result<(), QueueError> {
        let body = delivery.to_json()?;

        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::SendFailed {
                message: e.to_string(),
            })?;

        debug!(delivery_id = %delivery.delivery_id, "enqueued delivery");
        Ok(())
    }

    async fn receive(
        &self,
        wait: Duration,
    ) -> Result<Option<(QueuedDelivery, ReceiptHandle)>, QueueError> {
        let wait_seconds = (wait.as_secs() as i32).min(MAX_WAIT_SECONDS);

        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(wait_seconds)
            .send()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                message: e.to_string(),
            })?;

        let Some(message) = output.messages.unwrap_or_default().into_iter().next() else {
            return Ok(None);
        };

        let body = message.body.ok_or_else(|| QueueError::Serialization {
            message: "received SQS message without body".to_string(),
        })?;
        let handle = message
            .receipt_handle
            .ok_or_else(|| QueueError::ReceiveFailed {
                message: "received SQS message without receipt handle".to_string(),
            })?;

        let delivery = QueuedDelivery::from_json(&body)?;
        Ok(Some((delivery, ReceiptHandle(handle))))
    }

    async fn complete(&self, handle: ReceiptHandle) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(handle.0)
            .send()
            .await
            .map_err(|e| QueueError::CompleteFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn provider_type(&self) -> QueueProviderType {
        QueueProviderType::Sqs
    }
}

impl std::fmt::Debug for SqsDeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsDeliveryQueue")
            .field("queue_url", &self.queue_url)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

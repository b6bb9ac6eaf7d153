//! Background delivery worker.
//!
//! Active only when the queue is asynchronous: receives admitted deliveries,
//! parses them, drives the pipeline, and completes the message. A message is
//! completed even when processing fails terminally; the pipeline has already
//! recorded the failure and completed the check run, so redelivery would
//! change nothing.

use gate_core::DeliveryPipeline;
use gate_queue::{DeliveryQueue, QueuedDelivery, ReceiptHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Back-off after a transient receive failure.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// Drains the delivery queue into the processing pipeline.
pub struct DeliveryWorker {
    queue: Arc<dyn DeliveryQueue>,
    pipeline: Arc<DeliveryPipeline>,
    receive_wait: Duration,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<dyn DeliveryQueue>,
        pipeline: Arc<DeliveryPipeline>,
        receive_wait: Duration,
    ) -> Self {
        Self {
            queue,
            pipeline,
            receive_wait,
        }
    }

    /// Spawn the worker loop. Aborted via the returned handle at shutdown.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("delivery worker started");
            self.run().await;
        })
    }

    async fn run(&self) {
        loop {
            match self.queue.receive(self.receive_wait).await {
                Ok(Some((queued, handle))) => {
                    self.handle_message(queued, handle).await;
                }
                Ok(None) => {
                    // Remote providers long-poll inside receive; the
                    // in-memory provider returns immediately, so idle briefly
                    // instead of spinning.
                    if self.receive_wait.is_zero() {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "queue receive failed, backing off");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                }
                Err(e) => {
                    error!(error = %e, "permanent queue receive failure, worker stopping");
                    return;
                }
            }
        }
    }

    async fn handle_message(&self, queued: QueuedDelivery, handle: ReceiptHandle) {
        let delivery_id = queued.delivery_id.clone();

        match self.process_one(queued).await {
            Ok(()) => {}
            Err(e) => {
                // Terminal for this message either way: the pipeline records
                // failures and completes check runs before surfacing errors.
                error!(delivery_id, error = %e, "delivery processing failed");
            }
        }

        if let Err(e) = self.queue.complete(handle).await {
            warn!(delivery_id, error = %e, "failed to complete queue message");
        }
    }

    async fn process_one(&self, queued: QueuedDelivery) -> anyhow::Result<()> {
        let delivery = queued.into_delivery()?;
        let event = delivery.parse_event()?;
        self.pipeline.process(event).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;

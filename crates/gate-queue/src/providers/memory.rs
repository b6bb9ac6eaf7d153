//! In-memory queue provider.
//!
//! Backs the development fallback and tests. Messages live in a VecDeque;
//! received messages move to an in-flight table until completed, so a worker
//! crash in a test shows up as an un-completed message rather than silent
//! loss.

use crate::client::{DeliveryQueue, QueueProviderType, ReceiptHandle};
use crate::error::QueueError;
use crate::message::QueuedDelivery;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

#[derive(Default)]
struct State {
    ready: VecDeque<QueuedDelivery>,
    in_flight: HashMap<String, QueuedDelivery>,
}

/// Process-local delivery queue.
#[derive(Default)]
pub struct InMemoryDeliveryQueue {
    state: Mutex<State>,
}

impl InMemoryDeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received but not yet completed.
    pub fn in_flight_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .in_flight
            .len()
    }

    /// Messages waiting to be received.
    pub fn ready_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ready
            .len()
    }
}

#[async_trait]
impl DeliveryQueue for InMemoryDeliveryQueue {
    /// Process memory is always reachable.
    async fn probe(&self) -> Result<(), QueueError> {
        Ok(())
    }

    async fn enqueue(&self, delivery: QueuedDelivery) -> Result<(), QueueError> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ready
            .push_back(delivery);
        Ok(())
    }

    async fn receive(
        &self,
        _wait: Duration,
    ) -> Result<Option<(QueuedDelivery, ReceiptHandle)>, QueueError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let Some(delivery) = state.ready.pop_front() else {
            return Ok(None);
        };

        let handle = Uuid::new_v4().to_string();
        state.in_flight.insert(handle.clone(), delivery.clone());
        Ok(Some((delivery, ReceiptHandle(handle))))
    }

    async fn complete(&self, handle: ReceiptHandle) -> Result<(), QueueError> {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        state
            .in_flight
            .remove(&handle.0)
            .ok_or_else(|| QueueError::CompleteFailed {
                message: format!("unknown receipt handle {:?}", handle.0),
            })?;
        Ok(())
    }

    fn provider_type(&self) -> QueueProviderType {
        QueueProviderType::InMemory
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

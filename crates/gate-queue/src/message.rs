//! Queue message model.
//!
//! [`QueuedDelivery`] is the wire form of an admitted delivery: everything
//! the worker needs to re-parse and process it, serialized as JSON. Only
//! already-admitted deliveries are ever enqueued; the queue body is trusted
//! to the same degree as process memory.

use crate::error::QueueError;
use gate_core::{Delivery, DeliveryId, Timestamp};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Validated queue name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    pub fn new(value: impl Into<String>) -> Result<Self, QueueError> {
        let value = value.into();

        if value.is_empty() || value.len() > 80 {
            return Err(QueueError::Configuration {
                message: "queue name must be 1-80 characters".to_string(),
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(QueueError::Configuration {
                message: format!("queue name {:?} contains invalid characters", value),
            });
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wire form of one admitted delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedDelivery {
    pub delivery_id: String,
    pub event_type: String,
    pub body: Vec<u8>,
    pub received_at: Timestamp,
    pub source_addr: Option<IpAddr>,
}

impl QueuedDelivery {
    /// Capture an admitted delivery for the queue.
    ///
    /// The signature is deliberately not carried: it was already verified
    /// and must never be re-checked against a queue body an operator could
    /// have touched.
    pub fn from_delivery(delivery: &Delivery) -> Self {
        Self {
            delivery_id: delivery.id.as_str().to_string(),
            event_type: delivery.event_type.clone(),
            body: delivery.body.to_vec(),
            received_at: delivery.received_at,
            source_addr: delivery.source_addr,
        }
    }

    /// Reconstruct the delivery on the consuming side.
    ///
    /// # Errors
    ///
    /// [`QueueError::Serialization`] when the stored identifier no longer
    /// validates.
    pub fn into_delivery(self) -> Result<Delivery, QueueError> {
        let id = DeliveryId::new(self.delivery_id).map_err(|e| QueueError::Serialization {
            message: format!("invalid delivery id in queue message: {}", e),
        })?;

        let mut delivery = Delivery::new(id, self.event_type, bytes::Bytes::from(self.body));
        delivery.received_at = self.received_at;
        delivery.source_addr = self.source_addr;
        Ok(delivery)
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::Serialization {
            message: e.to_string(),
        })
    }

    /// Deserialize from the JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, QueueError> {
        serde_json::from_str(json).map_err(|e| QueueError::Serialization {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

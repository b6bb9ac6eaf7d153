//! # Gate-Queue
//!
//! Delivery queue abstraction for the Eval-Gate quality gate.
//!
//! Admitted webhook deliveries cross from the intake path to the processing
//! worker through a [`DeliveryQueue`]. Two providers exist: SQS for
//! production and an in-memory queue for development and tests. Startup
//! selection with an explicit reachability probe lives in
//! [`connect_queue`].

pub mod client;
pub mod error;
pub mod message;
pub mod providers;

pub use client::{
    connect_queue, DeliveryQueue, QueueConnection, QueueMode, QueueProviderType, ReceiptHandle,
    DEFAULT_PROBE_TIMEOUT,
};
pub use error::QueueError;
pub use message::{QueueName, QueuedDelivery};
pub use providers::memory::InMemoryDeliveryQueue;
pub use providers::sqs::SqsDeliveryQueue;

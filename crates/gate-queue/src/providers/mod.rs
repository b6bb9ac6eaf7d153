//! Queue provider implementations.

pub mod memory;
pub mod sqs;

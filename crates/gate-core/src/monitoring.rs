//! Metrics seam.
//!
//! The service records a handful of operational signals through this trait
//! so deployments can plug in whatever collector they run. The default
//! wiring uses [`NoOpMetricsCollector`]; the health endpoint's counters are
//! tracked separately in the pipeline and do not depend on this seam.

use std::time::Duration;

/// Sink for operational metrics.
pub trait MetricsCollector: Send + Sync {
    /// A delivery arrived at the webhook endpoint.
    fn record_delivery(&self, event_type: &str);

    /// A delivery was rejected by an admission stage.
    fn record_admission_rejection(&self, stage: &str);

    /// A delivery finished processing.
    fn record_processing(&self, outcome: &str, duration: Duration);

    /// The queue fell back to in-process handling at startup.
    fn record_queue_fallback(&self);
}

/// Collector that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetricsCollector;

impl MetricsCollector for NoOpMetricsCollector {
    fn record_delivery(&self, _event_type: &str) {}
    fn record_admission_rejection(&self, _stage: &str) {}
    fn record_processing(&self, _outcome: &str, _duration: Duration) {}
    fn record_queue_fallback(&self) {}
}
